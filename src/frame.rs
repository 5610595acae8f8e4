//! Grouping of the multiplexed serial protocol into frames.

use log::{debug, trace};

use crate::decode::RawFrame;
use crate::error::TransportError;
use crate::transport::LineSource;

/// First record of every Lambrecht transmission.
pub const THP_MARKER: &str = "$WIMTA";

/// Records per Lambrecht transmission (temperature, humidity, pressure).
pub const THP_GROUP_LEN: usize = 3;

/// Turns a line source into a sequence of `group_len`-line frames.
///
/// A frame always starts with a line containing `marker`. Lines read while
/// waiting for the marker are dropped, which recovers from attaching to the
/// line in the middle of a transmission. The remaining positions are taken as
/// they come; broken records are left for the decoder.
///
/// The sequence cannot be restarted. After a transport error build a new
/// synchronizer around a fresh transport.
#[derive(Debug)]
pub struct FrameSynchronizer<L> {
    source: L,
    marker: String,
    group_len: usize,
}

impl<L: LineSource> FrameSynchronizer<L> {
    pub fn new(source: L, marker: impl Into<String>, group_len: usize) -> Self {
        Self {
            source,
            marker: marker.into(),
            group_len: group_len.max(1),
        }
    }

    /// Synchronizer for the Lambrecht thermo-hygro-barometer protocol.
    pub fn thp(source: L) -> Self {
        Self::new(source, THP_MARKER, THP_GROUP_LEN)
    }

    /// Read until the next complete frame is available.
    pub async fn next_frame(&mut self) -> Result<RawFrame, TransportError> {
        let mut lines = Vec::with_capacity(self.group_len);
        let mut discarded = 0usize;

        while lines.len() < self.group_len {
            let bytes = self.source.read_line().await?;
            let line = String::from_utf8_lossy(&bytes).into_owned();

            if lines.is_empty() && !line.contains(&self.marker) {
                trace!("Discarding line before frame start: '{}'", line.escape_default());
                discarded += 1;
                continue;
            }
            lines.push(line);
        }

        if discarded > 0 {
            debug!("Resynchronized after discarding {} line(s)", discarded);
        }

        Ok(RawFrame::Lines(lines))
    }

    pub fn into_inner(self) -> L {
        self.source
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Replays scripted lines, then reports a disconnect.
    pub(crate) struct ScriptedLines {
        pub lines: VecDeque<Vec<u8>>,
        pub reads: usize,
    }

    impl ScriptedLines {
        pub(crate) fn new(lines: &[&str]) -> Self {
            Self {
                lines: lines.iter().map(|l| l.as_bytes().to_vec()).collect(),
                reads: 0,
            }
        }
    }

    impl LineSource for ScriptedLines {
        async fn read_line(&mut self) -> Result<Vec<u8>, TransportError> {
            self.reads += 1;
            self.lines.pop_front().ok_or(TransportError::Disconnected)
        }
    }

    fn lines(frame: RawFrame) -> Vec<String> {
        match frame {
            RawFrame::Lines(lines) => lines,
            RawFrame::Bytes(_) => panic!("expected a text frame"),
        }
    }

    #[tokio::test]
    async fn discards_leading_fragments_until_marker() {
        let source = ScriptedLines::new(&[
            "$WIMHU,45.1,,,",
            "$WIMMB,29.9,I,1013.2,B",
            "$WIMTA,21.3,C",
            "$WIMHU,45.2,,,",
            "$WIMMB,29.9,I,1013.3,B",
        ]);
        let mut sync = FrameSynchronizer::thp(source);

        let frame = lines(sync.next_frame().await.unwrap());
        assert_eq!(
            frame,
            vec!["$WIMTA,21.3,C", "$WIMHU,45.2,,,", "$WIMMB,29.9,I,1013.3,B"]
        );
        assert_eq!(sync.into_inner().reads, 5);
    }

    #[tokio::test]
    async fn later_positions_are_not_checked() {
        let source = ScriptedLines::new(&["$WIMTA,21.3,C", "", "$WIMTA,21.4,C"]);
        let mut sync = FrameSynchronizer::thp(source);

        let frame = lines(sync.next_frame().await.unwrap());
        assert_eq!(frame, vec!["$WIMTA,21.3,C", "", "$WIMTA,21.4,C"]);
    }

    #[tokio::test]
    async fn consecutive_frames_follow_the_cadence() {
        let source = ScriptedLines::new(&[
            "$WIMTA,1,C",
            "$WIMHU,2",
            "$WIMMB,0,I,3,B",
            "$WIMTA,4,C",
            "$WIMHU,5",
            "$WIMMB,0,I,6,B",
        ]);
        let mut sync = FrameSynchronizer::thp(source);

        assert_eq!(lines(sync.next_frame().await.unwrap())[0], "$WIMTA,1,C");
        assert_eq!(lines(sync.next_frame().await.unwrap())[0], "$WIMTA,4,C");
        assert!(matches!(
            sync.next_frame().await,
            Err(TransportError::Disconnected)
        ));
    }
}
