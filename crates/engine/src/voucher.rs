//! Voucher presenter.
//!
//! A [`Voucher`] is built once, when the wheel stops, and never recomputed:
//! its expiry is fixed at that instant. Export, share and download are
//! independent best-effort actions and never touch the session.

use std::{
    future::Future,
    path::{Path, PathBuf},
    sync::Arc,
};

use api_types::{
    customer::Customer, play::PlayResult, session::BranchSession, share::VoucherShare,
};
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use reqwest::Url;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::RewardBackend;

/// Days a voucher stays valid after issuance.
pub const VOUCHER_VALIDITY_DAYS: i64 = 7;

const SHARE_LINK_BASE: &str = "https://wa.me/";
const SVG_MIME: &str = "image/svg+xml";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("voucher could not be rendered: {0}")]
    Render(String),
    #[error("voucher could not be saved, try again: {0}")]
    Io(#[from] std::io::Error),
    #[error("share failed: {0}")]
    Share(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Voucher {
    pub code: String,
    pub prize_name: String,
    pub prize_color: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub customer: Customer,
    pub branch: BranchSession,
}

impl Voucher {
    pub fn issue(
        outcome: &PlayResult,
        customer: &Customer,
        branch: &BranchSession,
        issued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            code: outcome.voucher_code.clone(),
            prize_name: outcome.prize.name.clone(),
            prize_color: outcome.prize.color.clone(),
            issued_at,
            expires_at: issued_at + Duration::days(VOUCHER_VALIDITY_DAYS),
            customer: customer.clone(),
            branch: branch.clone(),
        }
    }

    pub fn file_name(&self) -> String {
        let safe: String = self
            .code
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        format!("voucher-{safe}.svg")
    }

    pub fn share_message(&self) -> String {
        format!(
            "I just won {} at {}! Voucher {} is valid until {}.",
            self.prize_name,
            self.branch.branch_name,
            self.code,
            self.expires_at.format("%Y-%m-%d")
        )
    }

    /// Pre-filled message-app link, used when no image share surface exists.
    pub fn share_link(&self) -> Result<Url, ExportError> {
        Url::parse_with_params(SHARE_LINK_BASE, &[("text", self.share_message())])
            .map_err(|err| ExportError::Share(err.to_string()))
    }

    /// Render the voucher view as an SVG document.
    pub fn render_svg(&self) -> Result<String, ExportError> {
        let code = escape(&self.code)?;
        let prize = escape(&self.prize_name)?;
        let color = escape(&self.prize_color)?;
        let branch = escape(&self.branch.branch_name)?;
        let holder = escape(&format!(
            "{} {}",
            self.customer.first_name, self.customer.last_name
        ))?;
        let expiry = self.expires_at.format("%d/%m/%Y");

        Ok(format!(
            r##"<svg xmlns="http://www.w3.org/2000/svg" width="600" height="340" viewBox="0 0 600 340">
  <rect width="600" height="340" rx="24" fill="#ffffff" stroke="{color}" stroke-width="8"/>
  <text x="300" y="60" font-family="sans-serif" font-size="22" text-anchor="middle" fill="#555555">{branch}</text>
  <text x="300" y="130" font-family="sans-serif" font-size="40" font-weight="bold" text-anchor="middle" fill="{color}">{prize}</text>
  <text x="300" y="200" font-family="monospace" font-size="34" text-anchor="middle" fill="#111111">{code}</text>
  <text x="300" y="250" font-family="sans-serif" font-size="18" text-anchor="middle" fill="#555555">{holder}</text>
  <text x="300" y="295" font-family="sans-serif" font-size="18" text-anchor="middle" fill="#555555">Valid until {expiry}</text>
</svg>
"##
        ))
    }

    pub fn export(&self) -> Result<VoucherArtifact, ExportError> {
        let svg = self.render_svg()?;
        Ok(VoucherArtifact {
            file_name: self.file_name(),
            mime: SVG_MIME,
            bytes: svg.into_bytes(),
        })
    }

    /// Write the exported image into `dir`. Failures can be retried.
    pub async fn download(&self, dir: &Path) -> Result<PathBuf, ExportError> {
        let artifact = self.export()?;
        let path = dir.join(&artifact.file_name);
        tokio::fs::create_dir_all(dir).await?;
        tokio::fs::write(&path, &artifact.bytes).await?;
        tracing::info!("voucher {} saved to {}", self.code, path.display());
        Ok(path)
    }

    /// Share the voucher image, or hand back a message-app link.
    ///
    /// Sharing is logged in the background; the outcome never depends on it.
    /// Keep the receipt and [`ShareReceipt::settle`] it before exiting so the
    /// log gets a chance to land.
    pub async fn share<S: ShareSurface, B: RewardBackend>(
        &self,
        surface: Option<&S>,
        backend: &Arc<B>,
    ) -> Result<ShareReceipt, ExportError> {
        let outcome = match surface.filter(|s| s.accepts_images()) {
            Some(surface) => match self.export() {
                Ok(artifact) => match surface.share(&artifact, &self.share_message()).await {
                    Ok(()) => ShareOutcome::Shared,
                    Err(err) => {
                        tracing::warn!("native share failed, falling back to link: {err}");
                        ShareOutcome::Link(self.share_link()?)
                    }
                },
                Err(err) => {
                    tracing::warn!("voucher export failed, falling back to link: {err}");
                    ShareOutcome::Link(self.share_link()?)
                }
            },
            None => ShareOutcome::Link(self.share_link()?),
        };

        let share = VoucherShare {
            voucher_code: self.code.clone(),
            from_customer_id: self.customer.id,
            branch_id: self.branch.branch_id,
            shared_at: Utc::now(),
        };
        let backend = Arc::clone(backend);
        let log = crate::events::detach("log voucher share", None, async move {
            backend.log_voucher_share(&share).await
        });

        Ok(ShareReceipt { outcome, log })
    }
}

/// Result of [`Voucher::share`] plus the pending share log.
///
/// Dropping the receipt leaves the log running detached.
#[derive(Debug)]
pub struct ShareReceipt {
    pub outcome: ShareOutcome,
    log: JoinHandle<()>,
}

impl ShareReceipt {
    /// Wait up to `limit` for the share log. Returns false on timeout; the
    /// log keeps running in that case.
    pub async fn settle(self, limit: std::time::Duration) -> bool {
        match tokio::time::timeout(limit, self.log).await {
            Ok(_) => true,
            Err(_) => {
                tracing::warn!("share log still pending after {limit:?}");
                false
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VoucherArtifact {
    pub file_name: String,
    pub mime: &'static str,
    pub bytes: Vec<u8>,
}

impl VoucherArtifact {
    pub fn data_uri(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime,
            base64::prelude::BASE64_STANDARD.encode(&self.bytes)
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ShareOutcome {
    /// Handed to the platform share surface.
    Shared,
    /// No image share available: open this link instead.
    Link(Url),
}

/// Platform share sheet.
pub trait ShareSurface: Send + Sync {
    fn accepts_images(&self) -> bool;

    fn share(
        &self,
        artifact: &VoucherArtifact,
        message: &str,
    ) -> impl Future<Output = Result<(), ExportError>> + Send;
}

/// Platform without an image share sheet: sharing always yields a link.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoShareSurface;

impl ShareSurface for NoShareSurface {
    fn accepts_images(&self) -> bool {
        false
    }

    async fn share(&self, _: &VoucherArtifact, _: &str) -> Result<(), ExportError> {
        Err(ExportError::Share("no share surface".to_string()))
    }
}

fn escape(text: &str) -> Result<String, ExportError> {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c if c.is_control() => {
                return Err(ExportError::Render(format!(
                    "control character U+{:04X} in voucher text",
                    c as u32
                )));
            }
            c => out.push(c),
        }
    }
    Ok(out)
}
