//! Presenting the authorization URL to the user.

/// Opens the authorization URL for the user.
pub trait BrowserLauncher: Send + Sync {
    /// Open `url`. Errors are reported but never abort the flow, since the
    /// URL is also written to the log.
    fn open(&self, url: &str) -> std::io::Result<()>;
}

/// Launches the platform's default browser.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBrowser;

impl BrowserLauncher for SystemBrowser {
    fn open(&self, url: &str) -> std::io::Result<()> {
        open::that(url)
    }
}

/// Never launches anything; the user copies the URL from the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBrowser;

impl BrowserLauncher for NoBrowser {
    fn open(&self, _url: &str) -> std::io::Result<()> {
        Ok(())
    }
}
