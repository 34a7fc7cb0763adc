//! Terminal output for the LanShare daemon: the startup banner and QR codes.

pub mod qr;

pub use qr::{generate_png_qr, generate_png_qr_bytes, generate_terminal_qr, png_data_url};

/// Access URLs printed at startup and served by `/api/server-info`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessUrls {
    /// For a browser on this machine.
    pub local: String,
    /// For other devices on the network.
    pub network: String,
}

impl AccessUrls {
    pub fn new(lan_ip: &str, port: u16, token: &str) -> Self {
        Self {
            local: format!("http://localhost:{port}/?token={token}"),
            network: format!("http://{lan_ip}:{port}/?token={token}"),
        }
    }
}

/// Startup banner with both URLs and, optionally, a terminal QR code of the
/// network URL.
pub fn banner(urls: &AccessUrls, with_qr: bool) -> String {
    let mut out = String::new();
    out.push_str("LanShare is running\n\n");
    out.push_str(&format!("  Local:   {}\n", urls.local));
    out.push_str(&format!("  Network: {}\n", urls.network));

    if with_qr {
        match generate_terminal_qr(&urls.network) {
            Ok(qr) => {
                out.push_str("\nScan to connect from your phone:\n");
                out.push_str(&qr);
            }
            Err(e) => tracing::warn!(error = %e, "Failed to render QR code"),
        }
    }

    out
}
