//! Tag inventory
//!
//! An inventory is one `SELECT_TAG` request with the INV flag set, answered
//! by a stream of responses: one `SELECT_TAG_PASS` per tag, then
//! `SELECT_TAG_INVENTORY_DONE`. With the LOOP flag the reader keeps
//! scanning until told to stop.

use std::fmt;
use std::ops::ControlFlow;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use skyetek_core::{
    constants::MAX_LOOP_OFF_REISSUES, Command, Request, Response, ResponseCode, Tag,
};

use crate::error::{Error, Result};
use crate::reader::Reader;

/// Inventory state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InventoryState {
    Idle,
    /// Request sent, waiting for the first answer
    Issued,
    Collecting,
    Done,
    /// Gave up; holds the failure code, `None` if the reader went quiet
    Failed(Option<ResponseCode>),
}

impl InventoryState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed(_))
    }
}

impl fmt::Display for InventoryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Issued => write!(f, "Issued"),
            Self::Collecting => write!(f, "Collecting"),
            Self::Done => write!(f, "Done"),
            Self::Failed(Some(code)) => write!(f, "Failed({})", code),
            Self::Failed(None) => write!(f, "Failed(no response)"),
        }
    }
}

/// Result of a completed inventory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InventoryOutcome {
    /// Tags in the order the reader reported them
    pub tags: Vec<Tag>,
    /// A looping scan ended because the callback returned `Break`
    pub stopped_by_callback: bool,
}

/// Everything a scan produced, including a failed one
struct Scan {
    outcome: InventoryOutcome,
    state: InventoryState,
}

impl Reader {
    /// Build the `SELECT_TAG` request for an inventory
    pub fn inventory_request(&self, tag: Tag, looping: bool) -> Request {
        self.request(Command::SelectTag)
            .with_tag(tag)
            .inventory(true)
            .looping(looping)
    }

    /// Run an inventory, calling `on_tag` for every tag found.
    ///
    /// `tag` selects the tag family to scan for. In loop mode the scan ends
    /// when `on_tag` returns [`ControlFlow::Break`]; a single scan always
    /// runs until the reader reports it is done, whatever `on_tag` returns.
    ///
    /// # Errors
    ///
    /// - [`Error::InventoryFailed`] on a failure code or a silent reader
    /// - [`Error::Cancelled`] once `cancel` fires
    /// - [`Error::LoopOffReissues`] if the reader never leaves loop mode
    pub async fn inventory_tags<F>(
        &mut self,
        tag: Tag,
        looping: bool,
        cancel: &CancellationToken,
        on_tag: F,
    ) -> Result<InventoryOutcome>
    where
        F: FnMut(&Tag) -> ControlFlow<()> + Send,
    {
        let scan = self.scan(tag, looping, cancel, on_tag).await?;

        match scan.state {
            InventoryState::Failed(code) => Err(Error::InventoryFailed { code }),
            _ => Ok(scan.outcome),
        }
    }

    /// Single inventory returning every tag seen.
    ///
    /// Tags collected before a failure are still returned.
    pub async fn select_tags(&mut self, tag: Tag) -> Result<Vec<Tag>> {
        let scan = self
            .scan(tag, false, &CancellationToken::new(), |_| {
                ControlFlow::Continue(())
            })
            .await?;

        if let InventoryState::Failed(code) = scan.state {
            debug!(
                "Inventory ended early ({}) with {} tags",
                InventoryState::Failed(code),
                scan.outcome.tags.len()
            );
        }

        Ok(scan.outcome.tags)
    }

    async fn scan<F>(
        &mut self,
        tag: Tag,
        looping: bool,
        cancel: &CancellationToken,
        mut on_tag: F,
    ) -> Result<Scan>
    where
        F: FnMut(&Tag) -> ControlFlow<()> + Send,
    {
        let request = self.inventory_request(tag, looping);
        let mut outcome = InventoryOutcome::default();
        let mut state = InventoryState::Idle;
        let mut first: Option<Response> = None;
        let mut reissues = 0;

        info!("Starting {} inventory", if looping { "loop" } else { "single" });

        while !state.is_terminal() {
            if cancel.is_cancelled() {
                info!("Inventory cancelled after {} tags", outcome.tags.len());
                return Err(Error::Cancelled);
            }

            state = match state {
                InventoryState::Idle => {
                    self.issue(&request).await?;
                    InventoryState::Issued
                }
                InventoryState::Issued => match self.next_response(&request, cancel).await? {
                    None => InventoryState::Failed(None),
                    Some(response) if response.code() == ResponseCode::SELECT_TAG_LOOP_OFF => {
                        reissues += 1;
                        if reissues > MAX_LOOP_OFF_REISSUES {
                            return Err(Error::LoopOffReissues {
                                command: request.command(),
                                attempts: MAX_LOOP_OFF_REISSUES,
                            });
                        }

                        debug!("Loop mode switched off, re-issuing inventory");
                        InventoryState::Idle
                    }
                    Some(response) => {
                        first = Some(response);
                        InventoryState::Collecting
                    }
                },
                InventoryState::Collecting => {
                    let response = match first.take() {
                        Some(response) => Some(response),
                        None => self.next_response(&request, cancel).await?,
                    };

                    match response {
                        None => InventoryState::Failed(None),
                        Some(response) => {
                            Self::collect(&response, looping, &mut outcome, &mut on_tag)
                        }
                    }
                }
                InventoryState::Done | InventoryState::Failed(_) => state,
            };

            trace!("Inventory state: {}", state);
        }

        match state {
            InventoryState::Failed(code) => warn!(
                "Inventory failed ({}) after {} tags",
                InventoryState::Failed(code),
                outcome.tags.len()
            ),
            _ => info!("Inventory done: {} tags", outcome.tags.len()),
        }

        Ok(Scan { outcome, state })
    }

    /// Handle one response while collecting
    fn collect<F>(
        response: &Response,
        looping: bool,
        outcome: &mut InventoryOutcome,
        on_tag: &mut F,
    ) -> InventoryState
    where
        F: FnMut(&Tag) -> ControlFlow<()>,
    {
        let code = response.code();

        if code == ResponseCode::SELECT_TAG_INVENTORY_DONE {
            return InventoryState::Done;
        }

        if !code.is_success() {
            return InventoryState::Failed(Some(code));
        }

        if code != ResponseCode::SELECT_TAG_PASS {
            trace!("Ignoring {} during inventory", code);
            return InventoryState::Collecting;
        }

        let tag = match response.tag() {
            Ok(Some(tag)) => tag,
            Ok(None) => return InventoryState::Collecting,
            Err(e) => {
                warn!("Malformed inventory response: {}", e);
                return InventoryState::Failed(Some(code));
            }
        };

        debug!("Found tag {}", tag);
        let flow = on_tag(&tag);
        outcome.tags.push(tag);

        if flow.is_break() && looping {
            outcome.stopped_by_callback = true;
            return InventoryState::Done;
        }

        InventoryState::Collecting
    }

    /// Next response, abandoned as soon as `cancel` fires
    async fn next_response(
        &mut self,
        request: &Request,
        cancel: &CancellationToken,
    ) -> Result<Option<Response>> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            response = self.get_response(request) => response,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Log, ScriptedTransport};
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use skyetek_core::{response::build_frame, RequestFlags, TagType};
    use std::sync::Arc;

    fn frame(code: ResponseCode) -> Vec<u8> {
        build_frame(code, &[]).to_vec()
    }

    /// Broadcast SELECT_TAG_PASS for an auto-detect request
    fn tag_pass(tag_type: TagType, tid: &[u8]) -> Vec<u8> {
        let mut body = tag_type.code().to_be_bytes().to_vec();
        body.extend_from_slice(&(tid.len() as u16).to_be_bytes());
        body.extend_from_slice(tid);
        build_frame(ResponseCode::SELECT_TAG_PASS, &body).to_vec()
    }

    fn tag_a() -> Tag {
        Tag::with_tid(TagType::ISO_18000_6C_AUTO_DETECT, vec![0xE2, 0x00, 0x00, 0x01])
    }

    fn tag_b() -> Tag {
        Tag::with_tid(TagType::ISO_18000_6C_AUTO_DETECT, vec![0xE2, 0x00, 0x00, 0x02])
    }

    fn pass(tag: &Tag) -> Vec<u8> {
        let tid = tag.tid.clone().unwrap_or_default();
        tag_pass(tag.tag_type, &tid)
    }

    fn stream(frames: &[Vec<u8>]) -> Vec<u8> {
        frames.concat()
    }

    async fn open_reader(replies: Vec<Vec<u8>>) -> (Reader, Arc<Mutex<Log>>) {
        let (transport, log) = ScriptedTransport::new(replies);
        let mut reader = Reader::new(transport);
        reader.open().await.unwrap();
        (reader, log)
    }

    #[tokio::test]
    async fn test_loop_off_then_tags() {
        let (mut reader, log) = open_reader(vec![
            frame(ResponseCode::SELECT_TAG_LOOP_OFF),
            stream(&[
                pass(&tag_a()),
                pass(&tag_b()),
                frame(ResponseCode::SELECT_TAG_INVENTORY_DONE),
            ]),
        ])
        .await;

        let mut seen = Vec::new();
        let outcome = reader
            .inventory_tags(Tag::new(), false, &CancellationToken::new(), |tag| {
                seen.push(tag.clone());
                ControlFlow::Continue(())
            })
            .await
            .unwrap();

        assert_eq!(outcome.tags, vec![tag_a(), tag_b()]);
        assert_eq!(seen, outcome.tags);
        assert!(!outcome.stopped_by_callback);

        let log = log.lock();
        assert_eq!(log.frames.len(), 2);
        assert_eq!(log.frames[0], log.frames[1]);

        let sent = Request::parse(&log.frames[0]).unwrap();
        assert_eq!(sent.command(), Command::SelectTag);
        assert!(sent.flags().contains(RequestFlags::INV));
        assert!(!sent.flags().contains(RequestFlags::LOOP));
    }

    #[tokio::test]
    async fn test_loop_stops_on_break() {
        let replies = vec![stream(&[
            pass(&tag_a()),
            pass(&tag_b()),
            frame(ResponseCode::SELECT_TAG_INVENTORY_DONE),
        ])];
        let (mut reader, log) = open_reader(replies).await;

        let outcome = reader
            .inventory_tags(Tag::new(), true, &CancellationToken::new(), |_| {
                ControlFlow::Break(())
            })
            .await
            .unwrap();

        assert_eq!(outcome.tags, vec![tag_a()]);
        assert!(outcome.stopped_by_callback);

        let sent = Request::parse(&log.lock().frames[0]).unwrap();
        assert!(sent.flags().contains(RequestFlags::LOOP));
    }

    #[tokio::test]
    async fn test_single_scan_ignores_break() {
        let replies = vec![stream(&[
            pass(&tag_a()),
            pass(&tag_b()),
            frame(ResponseCode::SELECT_TAG_INVENTORY_DONE),
        ])];
        let (mut reader, _) = open_reader(replies).await;

        let outcome = reader
            .inventory_tags(Tag::new(), false, &CancellationToken::new(), |_| {
                ControlFlow::Break(())
            })
            .await
            .unwrap();

        assert_eq!(outcome.tags, vec![tag_a(), tag_b()]);
        assert!(!outcome.stopped_by_callback);
    }

    #[tokio::test]
    async fn test_loop_on_ack_is_skipped() {
        let replies = vec![stream(&[
            frame(ResponseCode::SELECT_TAG_LOOP_ON),
            pass(&tag_a()),
            frame(ResponseCode::SELECT_TAG_INVENTORY_DONE),
        ])];
        let (mut reader, _) = open_reader(replies).await;

        let tags = reader.select_tags(Tag::new()).await.unwrap();
        assert_eq!(tags, vec![tag_a()]);
    }

    #[tokio::test]
    async fn test_silent_reader_fails() {
        let (mut reader, _) = open_reader(vec![vec![]]).await;

        let result = reader
            .inventory_tags(Tag::new(), false, &CancellationToken::new(), |_| {
                ControlFlow::Continue(())
            })
            .await;
        assert!(matches!(result, Err(Error::InventoryFailed { code: None })));
    }

    #[tokio::test]
    async fn test_stream_ends_without_done() {
        let (mut reader, _) = open_reader(vec![pass(&tag_a())]).await;

        let result = reader
            .inventory_tags(Tag::new(), false, &CancellationToken::new(), |_| {
                ControlFlow::Continue(())
            })
            .await;
        assert!(matches!(result, Err(Error::InventoryFailed { code: None })));

        let (mut reader, _) = open_reader(vec![pass(&tag_a())]).await;
        assert_eq!(reader.select_tags(Tag::new()).await.unwrap(), vec![tag_a()]);
    }

    #[tokio::test]
    async fn test_no_tag_in_field() {
        let (mut reader, _) = open_reader(vec![frame(ResponseCode::NO_TAG_IN_FIELD)]).await;

        let result = reader
            .inventory_tags(Tag::new(), false, &CancellationToken::new(), |_| {
                ControlFlow::Continue(())
            })
            .await;
        assert!(matches!(
            result,
            Err(Error::InventoryFailed { code: Some(ResponseCode::NO_TAG_IN_FIELD) })
        ));

        let (mut reader, _) = open_reader(vec![frame(ResponseCode::NO_TAG_IN_FIELD)]).await;
        assert!(reader.select_tags(Tag::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let (mut reader, log) = open_reader(vec![pass(&tag_a())]).await;

        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = reader
            .inventory_tags(Tag::new(), true, &cancel, |_| ControlFlow::Continue(()))
            .await;
        assert!(matches!(result, Err(Error::Cancelled)));
        assert!(log.lock().frames.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_from_callback() {
        let replies = vec![stream(&[pass(&tag_a()), pass(&tag_b())])];
        let (mut reader, _) = open_reader(replies).await;

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();

        let result = reader
            .inventory_tags(Tag::new(), true, &cancel, |_| {
                trigger.cancel();
                ControlFlow::Continue(())
            })
            .await;
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[tokio::test]
    async fn test_loop_off_bounded() {
        let replies = vec![frame(ResponseCode::SELECT_TAG_LOOP_OFF); 20];
        let (mut reader, log) = open_reader(replies).await;

        let result = reader.select_tags(Tag::new()).await;
        assert!(matches!(result, Err(Error::LoopOffReissues { .. })));
        assert_eq!(log.lock().frames.len(), MAX_LOOP_OFF_REISSUES + 1);
    }

    #[tokio::test]
    async fn test_addressed_inventory_carries_rid() {
        let (transport, log) = ScriptedTransport::new(vec![frame(
            ResponseCode::SELECT_TAG_INVENTORY_DONE,
        )]);
        let mut reader = Reader::new(transport).with_reader_id([0, 0, 0, 7].into());
        reader.open().await.unwrap();

        assert!(reader.select_tags(Tag::new()).await.unwrap().is_empty());

        let sent = Request::parse(&log.lock().frames[0]).unwrap();
        assert_eq!(sent.rid(), [0, 0, 0, 7]);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(InventoryState::Collecting.to_string(), "Collecting");
        assert_eq!(
            InventoryState::Failed(Some(ResponseCode::NO_TAG_IN_FIELD)).to_string(),
            "Failed(NO_TAG_IN_FIELD(0x8002))"
        );
        assert!(InventoryState::Done.is_terminal());
        assert!(!InventoryState::Issued.is_terminal());
    }
}
