//! Resident applications a document may start (`X_DPA_startResidentApp`).
//!
//! Only the communication browser (`ComBrowser`) is supported: it is handed
//! over to the host as a `startBrowser` request.

use tracing::debug;

use crate::protocol::EngineMessage;

pub const COM_BROWSER: &str = "ComBrowser";

/// Outcome of a resident application launch.
#[derive(Debug, Clone, PartialEq)]
pub enum ResidentAppLaunch {
    /// The host must be asked to open a browser; the document gets 1.
    StartBrowser(EngineMessage),
    /// Refused; the document gets NaN.
    Refused,
}

impl ResidentAppLaunch {
    /// Return value seen by the document (`None` stands for NaN).
    pub fn return_value(&self) -> Option<i32> {
        match self {
            ResidentAppLaunch::StartBrowser(_) => Some(1),
            ResidentAppLaunch::Refused => None,
        }
    }
}

/// Decides what to do with a resident application request.
///
/// For `ComBrowser`, `ex_info` is `[uri, mode, fullscreen]`: the URI must be
/// http(s), mode `"0"` (browser for broadcast-conformant content) is refused,
/// and fullscreen is requested with `"1"`. A missing fullscreen means no.
pub fn start_resident_app(app_name: &str, ex_info: &[String]) -> ResidentAppLaunch {
    if app_name != COM_BROWSER {
        debug!(app_name, "Unsupported resident application");
        return ResidentAppLaunch::Refused;
    }
    let [uri, mode, rest @ ..] = ex_info else {
        debug!(args = ex_info.len(), "ComBrowser launched with missing arguments");
        return ResidentAppLaunch::Refused;
    };
    if !uri.starts_with("http://") && !uri.starts_with("https://") {
        return ResidentAppLaunch::Refused;
    }
    if mode == "0" {
        return ResidentAppLaunch::Refused;
    }
    ResidentAppLaunch::StartBrowser(EngineMessage::StartBrowser {
        uri: uri.clone(),
        fullscreen: rest.first().is_some_and(|f| f == "1"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_com_browser_starts_host_browser() {
        let launch = start_resident_app(COM_BROWSER, &args(&["https://example.jp/", "2", "1"]));
        assert_eq!(launch.return_value(), Some(1));
        assert_eq!(
            launch,
            ResidentAppLaunch::StartBrowser(EngineMessage::StartBrowser {
                uri: "https://example.jp/".to_string(),
                fullscreen: true,
            })
        );
    }

    #[test]
    fn test_fullscreen_defaults_to_false() {
        let launch = start_resident_app(COM_BROWSER, &args(&["http://example.jp/", "1"]));
        assert_eq!(launch.return_value(), Some(1));
        assert_eq!(
            launch,
            ResidentAppLaunch::StartBrowser(EngineMessage::StartBrowser {
                uri: "http://example.jp/".to_string(),
                fullscreen: false,
            })
        );
    }

    #[test]
    fn test_refusals() {
        let refused = [
            start_resident_app("BookmarkList", &args(&["https://example.jp/", "1", "0"])),
            start_resident_app(COM_BROWSER, &args(&["ftp://example.jp/", "1", "0"])),
            start_resident_app(COM_BROWSER, &args(&["http://example.jp/", "0", "0"])),
            start_resident_app(COM_BROWSER, &args(&["http://example.jp/"])),
        ];
        for launch in refused {
            assert_eq!(launch, ResidentAppLaunch::Refused);
            assert_eq!(launch.return_value(), None);
        }
    }
}
