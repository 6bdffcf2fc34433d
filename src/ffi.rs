//! C FFI layer for cross-language interoperability.
//!
//! Structured results cross the boundary as JSON strings. Every string handed
//! out by this module must be released with `mathguard_free_string` or, for
//! a whole result, `mathguard_free_result`.

use crate::analyzer::analyze;
use crate::config::{MathBackend, PluginConfig, RenderConfig, RenderMode};
use crate::error::{ConfigError, Error};
use crate::metrics;
use crate::render::render;
use crate::sanitize::sanitize;
use libc::{c_char, c_int};
use serde::Serialize;
use std::ffi::{CStr, CString};
use std::ptr;

/// Render configuration for `mathguard_render`.
#[repr(C)]
pub struct MathGuardConfig {
    /// Mode: 0 = auto, 1 = full, 2 = safe, 3 = math-optimized, 4 = plaintext;
    /// any other value is a configuration error
    pub mode: c_int,
    /// Degradation attempts after the first; must not be negative
    pub max_retries: c_int,
    /// Append diagnostics to fallback output when non-zero
    pub debug: c_int,
    /// Math backend: 0 = KaTeX, 1 = MathJax, 2 = MathML
    pub math_backend: c_int,
}

impl Default for MathGuardConfig {
    fn default() -> Self {
        Self {
            mode: 0,
            max_retries: crate::config::DEFAULT_MAX_RETRIES as c_int,
            debug: 0,
            math_backend: 0,
        }
    }
}

impl MathGuardConfig {
    fn to_render_config(&self) -> Result<RenderConfig, Error> {
        let mode = match self.mode {
            0 => RenderMode::Auto,
            1 => RenderMode::Full,
            2 => RenderMode::Safe,
            3 => RenderMode::MathOptimized,
            4 => RenderMode::Plaintext,
            other => return Err(ConfigError::UnknownMode(other.to_string()).into()),
        };
        let math_backend = match self.math_backend {
            1 => MathBackend::MathJax,
            2 => MathBackend::MathML,
            _ => MathBackend::KaTeX,
        };

        let config = RenderConfig::builder()
            .mode(mode)
            .max_retries(i64::from(self.max_retries))
            .debug(self.debug != 0)
            .plugin(PluginConfig {
                math_backend,
                ..PluginConfig::default()
            })
            .build()?;
        Ok(config)
    }
}

/// Result type for FFI operations.
#[repr(C)]
pub struct MathGuardResult {
    /// Pointer to result string (caller must free with mathguard_free_string)
    pub data: *mut c_char,
    /// Error message if data is null (caller must free with mathguard_free_string)
    pub error: *mut c_char,
}

impl MathGuardResult {
    fn ok(data: String) -> Self {
        Self {
            data: to_c_string(data).into_raw(),
            error: ptr::null_mut(),
        }
    }

    fn err(error: impl ToString) -> Self {
        Self {
            data: ptr::null_mut(),
            error: to_c_string(error.to_string()).into_raw(),
        }
    }

    fn json<T: Serialize>(value: &T) -> Self {
        match serde_json::to_string(value) {
            Ok(json) => Self::ok(json),
            Err(e) => Self::err(Error::from(e)),
        }
    }
}

/// Interior NULs cannot cross the C boundary; they are dropped.
fn to_c_string(s: String) -> CString {
    CString::new(s.replace('\0', "")).unwrap_or_default()
}

/// A null pointer reads as empty content.
unsafe fn read_input<'a>(input: *const c_char) -> Result<&'a str, MathGuardResult> {
    if input.is_null() {
        return Ok("");
    }
    CStr::from_ptr(input)
        .to_str()
        .map_err(|_| MathGuardResult::err("Invalid UTF-8 input"))
}

/// Analyze content and return the analysis as JSON.
///
/// # Safety
///
/// - `input` must be null or a valid null-terminated UTF-8 string.
/// - The returned result must be freed with `mathguard_free_result`.
#[no_mangle]
pub unsafe extern "C" fn mathguard_analyze(input: *const c_char) -> MathGuardResult {
    match read_input(input) {
        Ok(input) => MathGuardResult::json(&analyze(input)),
        Err(result) => result,
    }
}

/// Repair malformed content and return the sanitized text.
///
/// # Safety
///
/// - `input` must be null or a valid null-terminated UTF-8 string.
/// - The returned result must be freed with `mathguard_free_result`.
#[no_mangle]
pub unsafe extern "C" fn mathguard_sanitize(input: *const c_char) -> MathGuardResult {
    match read_input(input) {
        Ok(input) => {
            let analysis = analyze(input);
            MathGuardResult::ok(sanitize(input, Some(&analysis)))
        }
        Err(result) => result,
    }
}

/// Render content through the degradation chain and return the outcome as JSON.
///
/// A null `config` uses the defaults.
///
/// # Safety
///
/// - `input` must be null or a valid null-terminated UTF-8 string.
/// - `config` must be null or a valid pointer to `MathGuardConfig`.
/// - The returned result must be freed with `mathguard_free_result`.
#[no_mangle]
pub unsafe extern "C" fn mathguard_render(
    input: *const c_char,
    config: *const MathGuardConfig,
) -> MathGuardResult {
    let input = match read_input(input) {
        Ok(input) => input,
        Err(result) => return result,
    };

    let config = if config.is_null() {
        MathGuardConfig::default().to_render_config()
    } else {
        (*config).to_render_config()
    };

    match config {
        Ok(config) => MathGuardResult::json(&render(input, &config)),
        Err(e) => MathGuardResult::err(e),
    }
}

/// Snapshot of the process-wide metrics as JSON.
///
/// # Safety
///
/// The returned result must be freed with `mathguard_free_result`.
#[no_mangle]
pub unsafe extern "C" fn mathguard_metrics_snapshot() -> MathGuardResult {
    MathGuardResult::json(&metrics::global().snapshot())
}

/// Trend over the last `window` outcomes as JSON.
///
/// # Safety
///
/// The returned result must be freed with `mathguard_free_result`.
#[no_mangle]
pub unsafe extern "C" fn mathguard_metrics_trend(window: usize) -> MathGuardResult {
    MathGuardResult::json(&metrics::global().trend(window))
}

/// Clear the process-wide metrics.
#[no_mangle]
pub extern "C" fn mathguard_metrics_reset() {
    metrics::global().reset();
}

/// Free a string allocated by this library.
///
/// # Safety
///
/// - `s` must be a pointer returned by this library, or null.
/// - `s` must not have been freed already.
#[no_mangle]
pub unsafe extern "C" fn mathguard_free_string(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

/// Free a result's strings.
///
/// # Safety
///
/// - `result` must be a valid `MathGuardResult`.
/// - The result's strings must not have been freed already.
#[no_mangle]
pub unsafe extern "C" fn mathguard_free_result(result: MathGuardResult) {
    mathguard_free_string(result.data);
    mathguard_free_string(result.error);
}

/// Get the library version string.
///
/// The returned string is statically allocated and must not be freed.
#[no_mangle]
pub extern "C" fn mathguard_version() -> *const c_char {
    static VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "\0");
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    unsafe fn take(result: MathGuardResult) -> Result<String, String> {
        let out = if result.data.is_null() {
            Err(CStr::from_ptr(result.error).to_string_lossy().into_owned())
        } else {
            Ok(CStr::from_ptr(result.data).to_string_lossy().into_owned())
        };
        mathguard_free_result(result);
        out
    }

    #[test]
    fn test_analyze_returns_json() {
        let input = CString::new("Euler: $e^{i\\pi} + 1 = 0$").unwrap();
        let json = unsafe { take(mathguard_analyze(input.as_ptr())) }.unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["hasMath"], serde_json::Value::Bool(true));
        assert_eq!(value["mathCount"], serde_json::json!(2));
    }

    #[test]
    fn test_null_input_is_empty_content() {
        let json = unsafe { take(mathguard_analyze(ptr::null())) }.unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["complexity"], serde_json::json!("none"));

        let json = unsafe { take(mathguard_render(ptr::null(), ptr::null())) }.unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value["output"].as_str().unwrap().contains("No content to display"));
    }

    #[test]
    fn test_invalid_utf8() {
        let bytes = [0xffu8, 0xfe, 0];
        let result = unsafe { take(mathguard_sanitize(bytes.as_ptr() as *const c_char)) };
        assert_eq!(result, Err("Invalid UTF-8 input".to_string()));
    }

    #[test]
    fn test_sanitize_closes_braces() {
        let input = CString::new("$\\frac{1}{2$").unwrap();
        let out = unsafe { take(mathguard_sanitize(input.as_ptr())) }.unwrap();
        assert_eq!(out.matches('{').count(), out.matches('}').count());
    }

    #[test]
    fn test_render_with_default_config() {
        let input = CString::new("plain words").unwrap();
        let json = unsafe { take(mathguard_render(input.as_ptr(), ptr::null())) }.unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value["output"].as_str().unwrap().contains("plain words"));
        assert!(value.get("finalStrategy").is_some());
    }

    #[test]
    fn test_render_rejects_negative_retries() {
        let input = CString::new("x").unwrap();
        let config = MathGuardConfig {
            max_retries: -1,
            ..MathGuardConfig::default()
        };
        let err = unsafe { take(mathguard_render(input.as_ptr(), &config)) }.unwrap_err();
        assert!(err.contains("must not be negative"), "{}", err);
    }

    #[test]
    fn test_render_rejects_unknown_mode() {
        let input = CString::new("x").unwrap();
        for mode in [-1, 5, 7] {
            let config = MathGuardConfig {
                mode,
                ..MathGuardConfig::default()
            };
            let err = unsafe { take(mathguard_render(input.as_ptr(), &config)) }.unwrap_err();
            assert!(err.contains(&format!("Unknown render mode '{}'", mode)), "{}", err);
        }
    }

    #[test]
    fn test_version() {
        let version = unsafe { CStr::from_ptr(mathguard_version()) };
        assert_eq!(version.to_str().unwrap(), env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_interior_nul_is_dropped() {
        assert_eq!(to_c_string("a\0b".to_string()).to_str().unwrap(), "ab");
    }
}
