//! Output Decoding
//!
//! Native Windows tools write console output in the legacy system code page
//! (GBK on Chinese-locale hosts). POSIX tools write UTF-8. Both are normalized
//! to UTF-8 here, falling back to U+FFFD for malformed sequences.

use super::platform::Platform;
use encoding_rs::{Encoding, GBK, UTF_8};
use tracing::warn;

/// Default code page for Windows console output
pub const DEFAULT_CODE_PAGE: &str = "gbk";

/// Error returned for an unknown encoding label
#[derive(Debug, thiserror::Error)]
#[error("Unknown code page '{0}'")]
pub struct UnknownCodePage(pub String);

/// Text decoded from process output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub text: String,

    /// Whether malformed sequences were replaced
    pub degraded: bool,
}

/// Converts raw process output into UTF-8 text for one platform
#[derive(Debug, Clone, Copy)]
pub struct OutputDecoder {
    platform: Platform,
    code_page: &'static Encoding,
}

impl OutputDecoder {
    /// Decoder using the default Windows code page
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            code_page: GBK,
        }
    }

    /// Decoder with an explicit Windows code page label (e.g. `gbk`, `shift_jis`, `windows-1252`)
    pub fn with_code_page(platform: Platform, label: &str) -> Result<Self, UnknownCodePage> {
        let code_page = Encoding::for_label(label.trim().as_bytes())
            .ok_or_else(|| UnknownCodePage(label.to_string()))?;
        Ok(Self {
            platform,
            code_page,
        })
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Encoding applied to output on this decoder's platform
    pub fn encoding(&self) -> &'static Encoding {
        match self.platform {
            Platform::Windows => self.code_page,
            Platform::Posix => UTF_8,
        }
    }

    /// Decode without trimming, reporting whether the input was malformed
    pub fn decode_raw(&self, bytes: &[u8]) -> Decoded {
        let (text, degraded) = self.encoding().decode_without_bom_handling(bytes);
        Decoded {
            text: text.into_owned(),
            degraded,
        }
    }

    /// Decode and trim surrounding whitespace
    pub fn decode(&self, bytes: &[u8]) -> String {
        let decoded = self.decode_raw(bytes);
        if decoded.degraded {
            warn!(
                encoding = self.encoding().name(),
                len = bytes.len(),
                "Output contained malformed byte sequences, decoded lossily"
            );
        }
        decoded.text.trim().to_string()
    }
}
