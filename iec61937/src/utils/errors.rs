use std::collections::TryReserveError;
use std::io;

#[macro_export]
macro_rules! log_or_err {
    ($state:expr, $level:expr, $err:expr $(,)?) => {{
        if $level <= $state.fail_level {
            return Err($err);
        } else {
            match $level {
                ::log::Level::Error => ::log::error!("{}", $err),
                ::log::Level::Warn => ::log::warn!("{}", $err),
                ::log::Level::Info => ::log::info!("{}", $err),
                ::log::Level::Debug => ::log::debug!("{}", $err),
                ::log::Level::Trace => ::log::trace!("{}", $err),
            }
        }
    }};
}

#[derive(thiserror::Error, Debug)]
pub enum HeaderError {
    #[error("Header needs {needed} bytes, only {available} available")]
    TooShort { needed: usize, available: usize },

    #[error("Invalid A/52 sync word. Read {0:#06X}")]
    InvalidA52Sync(u16),

    #[error("fscod must not be 3")]
    ReservedSampleRateCode,

    #[error("fscod2 must not be 3")]
    ReservedReducedSampleRateCode,

    #[error("frmsizecod must be < 38. Read {0}")]
    InvalidFrameSizeCode(u8),

    #[error("Unsupported A/52 bsid {0}")]
    UnsupportedBsid(u8),

    #[error("strmtyp 3 is reserved")]
    ReservedStreamType,

    #[error("No DTS sync word. Read {0:#010X}")]
    InvalidDtsSync(u32),

    #[error("DTS frame carries no core audio")]
    MissingDtsCore,

    #[error("DTS nblks must be >= 5. Read {0}")]
    InvalidBlockCount(u8),

    #[error("DTS fsize must be >= 95. Read {0}")]
    InvalidFrameSize(u16),

    #[error("Invalid DTS sfreq {0}")]
    InvalidDtsSampleRate(u8),

    #[error("MLP access unit length {0} is shorter than its header")]
    InvalidAccessUnitLength(usize),

    #[error(transparent)]
    Bitstream(#[from] io::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum ExtractError {
    #[error("Mismatch in substream count: found {found}, expected {expected}")]
    SubstreamMismatch { found: usize, expected: usize },

    #[error("Parity check failed for access unit")]
    ParityCheckFailed,

    #[error("Insufficient buffer data for frame extraction")]
    InsufficientData,

    #[error("Invalid sync pattern detected")]
    InvalidSyncPattern,

    #[error("Unexpected {found} syncframe in a {expected} stream")]
    CodecMismatch {
        found: &'static str,
        expected: &'static str,
    },

    #[error(transparent)]
    Header(#[from] HeaderError),
}

/// Broad classification of [`EncapsulateError`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MalformedHeader,
    SizeMismatch,
    UnsupportedFraming,
    StateViolation,
    ResourceExhaustion,
}

#[derive(thiserror::Error, Debug)]
pub enum EncapsulateError {
    #[error("Malformed header: {0}")]
    MalformedHeader(#[from] HeaderError),

    #[error("Frame of {size} bytes does not fit in {available} bytes")]
    SizeMismatch { size: usize, available: usize },

    #[error("E-AC-3 syncframe in an AC-3 stream")]
    UnexpectedEac3,

    #[error("Trailing {0} bytes are not a dependent E-AC-3 substream")]
    MissingDependentSubstream(usize),

    #[error("DTS frames of {0} samples cannot be sent as DTS type I/II/III")]
    UnsupportedDtsFrameLength(u32),

    #[error("No DTS-HD subtype for a period of {0} frames")]
    UnmappedDtsHdPeriod(u32),

    #[error("E-AC-3 burst would hold {0} audio blocks, expected 6")]
    TooManyBlocks(u32),

    #[error("TrueHD access unit before the first major sync")]
    MissingMajorSync,

    #[error("TrueHD access unit of {0} bytes is too short")]
    AccessUnitTooShort(usize),

    #[error("No MAT code at or after buffer position {0}")]
    MatCodeFailure(usize),

    #[error(
        "Unusual TrueHD frame timing: {prev} => {current}, {samples_per_frame} samples/frame"
    )]
    TimingDiscontinuity {
        prev: u16,
        current: u16,
        samples_per_frame: u32,
    },

    #[error("Burst capacity must be a multiple of 4 above 8. Got {0}")]
    InvalidCapacity(usize),

    #[error("Invalid stream configuration: {0}")]
    InvalidConfig(&'static str),

    #[error("Burst allocation failed: {0}")]
    Allocation(#[from] TryReserveError),
}

impl EncapsulateError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedHeader(_) | Self::UnexpectedEac3 | Self::MissingDependentSubstream(_) => {
                ErrorKind::MalformedHeader
            }
            Self::SizeMismatch { .. } | Self::AccessUnitTooShort(_) => ErrorKind::SizeMismatch,
            Self::UnsupportedDtsFrameLength(_) | Self::UnmappedDtsHdPeriod(_) => {
                ErrorKind::UnsupportedFraming
            }
            Self::TooManyBlocks(_)
            | Self::MissingMajorSync
            | Self::MatCodeFailure(_)
            | Self::TimingDiscontinuity { .. }
            | Self::InvalidCapacity(_)
            | Self::InvalidConfig(_) => ErrorKind::StateViolation,
            Self::Allocation(_) => ErrorKind::ResourceExhaustion,
        }
    }

    /// Returns `true` when the stream cannot continue after this error.
    ///
    /// Every other error only rejects the offending frame.
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::ResourceExhaustion
    }
}
