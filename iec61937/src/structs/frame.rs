/// Presentation and decoding timestamps carried alongside a frame.
///
/// Units are whatever the caller uses consistently; the encapsulator only moves
/// them from input frames onto the bursts they start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameTiming {
    pub pts: Option<i64>,
    pub dts: Option<i64>,
}

/// One delimited compressed syncframe handed to the encapsulator.
///
/// `sample_count` is the number of audio samples the frame decodes to as declared
/// by the producer. It is advisory: encapsulators that need it re-derive it from
/// the header when it looks inconsistent.
#[derive(Debug, Clone, Copy)]
pub struct ElementaryFrame<'a> {
    pub data: &'a [u8],
    pub sample_count: u32,
    pub timing: FrameTiming,
    pub duration: u64,
}

impl<'a> ElementaryFrame<'a> {
    pub fn new(data: &'a [u8], sample_count: u32) -> Self {
        Self {
            data,
            sample_count,
            timing: FrameTiming::default(),
            duration: 0,
        }
    }

    pub fn with_timing(mut self, pts: Option<i64>, dts: Option<i64>) -> Self {
        self.timing = FrameTiming { pts, dts };
        self
    }

    pub fn with_duration(mut self, duration: u64) -> Self {
        self.duration = duration;
        self
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
