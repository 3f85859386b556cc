/// Errors surfaced by the playback engine.
///
/// Underruns are not errors: the engine covers them with silence and counts
/// them (see [`crate::Completion::Underrun`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// No pacing channel could be claimed. Playback cannot begin.
    NoTransferChannel,
    /// The engine was started before slot 0 was armed.
    NotPrimed,
    /// A new stream was loaded while the current one is still live.
    Busy,
    /// The asset is not a RIFF/WAVE container or is truncated.
    MalformedAsset,
    /// The asset is not mono 16 bit PCM.
    UnsupportedFormat,
}

impl Error {
    /// Short lowercase description. `Display` writes exactly this.
    pub fn message(&self) -> &'static str {
        match self {
            Self::NoTransferChannel => "no transfer channel available",
            Self::NotPrimed => "engine started before slot 0 was armed",
            Self::Busy => "a stream is still playing",
            Self::MalformedAsset => "malformed wave asset",
            Self::UnsupportedFormat => "asset is not mono 16 bit pcm",
        }
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.message())
    }
}

pub type Result<T> = core::result::Result<T, Error>;
