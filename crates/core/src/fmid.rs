//! FMID formatting and parsing.
//!
//! FMIDs are 64-bit folder/message identifiers. Zero is reserved and never
//! names a record. The canonical display form is fixed-width hex
//! (`0x0123456789abcdef`), used in logs and as the embedded-backend key
//! rendering.

use crate::error::{CoreError, CoreResult};

/// Render an FMID in the canonical fixed-width hex form.
pub fn format_fmid(fmid: u64) -> String {
    format!("0x{fmid:016x}")
}

/// Parse an FMID from its canonical form. Accepts any hex width with an
/// `0x`/`0X` prefix; rejects zero.
pub fn parse_fmid(input: &str) -> CoreResult<u64> {
    let digits = input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
        .ok_or_else(|| CoreError::InvalidFmid(format!("missing 0x prefix: {input:?}")))?;
    let fmid = u64::from_str_radix(digits, 16)
        .map_err(|e| CoreError::InvalidFmid(format!("{input:?}: {e}")))?;
    if fmid == 0 {
        return Err(CoreError::InvalidFmid("fmid zero is reserved".to_string()));
    }
    Ok(fmid)
}
