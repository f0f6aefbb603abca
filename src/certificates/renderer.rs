use std::sync::Arc;

use bytes::Bytes;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::OffsetDateTime;
use tracing::warn;
use uuid::Uuid;

const LONG_DATE: &[FormatItem<'static>] = format_description!("[month repr:long] [day], [year]");

/// Fields embedded in every certificate, regardless of output format.
#[derive(Debug, Clone)]
pub struct CertificateData {
    pub certificate_number: String,
    pub participant_name: String,
    pub event_title: String,
    pub event_type: String,
    pub event_date: String,
    pub event_venue: String,
    pub issue_date: String,
}

#[derive(Debug, Clone)]
pub struct RenderedCertificate {
    pub body: Bytes,
    pub content_type: &'static str,
    pub extension: &'static str,
}

/// Produces the certificate artifact. Two implementations honor the same
/// contract: a full-fidelity HTML document and a plain-text fallback.
pub trait CertificateRenderer: Send + Sync {
    fn format_name(&self) -> &'static str;
    fn render(&self, data: &CertificateData) -> anyhow::Result<RenderedCertificate>;
}

/// Styled, self-contained HTML document.
pub struct HtmlCertificateRenderer;

impl CertificateRenderer for HtmlCertificateRenderer {
    fn format_name(&self) -> &'static str {
        "html"
    }

    fn render(&self, data: &CertificateData) -> anyhow::Result<RenderedCertificate> {
        let html = format!(
            r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Certificate of Participation</title>
<style>
  body {{ font-family: Georgia, serif; background: #f5f1e8; margin: 0; }}
  .certificate {{ max-width: 760px; margin: 48px auto; padding: 56px 64px;
                  background: #fff; border: 10px double #8a6d3b; text-align: center; }}
  h1 {{ font-size: 32px; letter-spacing: 4px; color: #8a6d3b; margin-bottom: 8px; }}
  .number {{ font-size: 12px; color: #888; letter-spacing: 2px; }}
  .participant {{ font-size: 28px; margin: 24px 0 8px; }}
  .event {{ font-size: 20px; font-style: italic; margin: 8px 0; }}
  .detail {{ font-size: 14px; color: #555; margin: 4px 0; }}
  .issued {{ margin-top: 36px; font-size: 13px; color: #777; }}
</style>
</head>
<body>
<div class="certificate">
  <h1>CERTIFICATE OF PARTICIPATION</h1>
  <div class="number">{number}</div>
  <p class="detail">This is to certify that</p>
  <div class="participant">{participant}</div>
  <p class="detail">has participated in the {event_type}</p>
  <div class="event">{title}</div>
  <p class="detail">held on {date} at {venue}</p>
  <div class="issued">Issued on {issued}</div>
</div>
</body>
</html>
"#,
            number = data.certificate_number,
            participant = data.participant_name,
            event_type = data.event_type,
            title = data.event_title,
            date = data.event_date,
            venue = data.event_venue,
            issued = data.issue_date,
        );
        Ok(RenderedCertificate {
            body: Bytes::from(html),
            content_type: "text/html; charset=utf-8",
            extension: "html",
        })
    }
}

/// Degraded plain-text format carrying the same fields.
pub struct PlainTextCertificateRenderer;

impl CertificateRenderer for PlainTextCertificateRenderer {
    fn format_name(&self) -> &'static str {
        "text"
    }

    fn render(&self, data: &CertificateData) -> anyhow::Result<RenderedCertificate> {
        let text = format!(
            "CERTIFICATE OF PARTICIPATION\n\
             Certificate No: {}\n\
             Event: {}\n\
             Type: {}\n\
             Participant: {}\n\
             Date: {}\n\
             Venue: {}\n\
             Issued on: {}\n",
            data.certificate_number,
            data.event_title,
            data.event_type,
            data.participant_name,
            data.event_date,
            data.event_venue,
            data.issue_date,
        );
        Ok(RenderedCertificate {
            body: Bytes::from(text),
            content_type: "text/plain; charset=utf-8",
            extension: "txt",
        })
    }
}

/// Picks the renderer at startup. Unrecognized values fall back to the
/// plain-text format rather than failing boot.
pub fn renderer_from_config(format: &str) -> Arc<dyn CertificateRenderer> {
    match format {
        "html" => Arc::new(HtmlCertificateRenderer),
        "text" | "plain" => Arc::new(PlainTextCertificateRenderer),
        other => {
            warn!(format = %other, "unknown certificate format, using plain text");
            Arc::new(PlainTextCertificateRenderer)
        }
    }
}

/// Certificate number derived deterministically from the registration id.
pub fn certificate_number(registration_id: Uuid) -> String {
    let hex = registration_id.simple().to_string();
    format!("CERT-{}", hex[..8].to_uppercase())
}

/// Storage key with a collision-resistant random suffix.
pub fn artifact_key(registration_id: Uuid, extension: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("certificates/{}-{}.{}", registration_id, &suffix[..8], extension)
}

pub fn format_long_date(date: OffsetDateTime) -> anyhow::Result<String> {
    Ok(date.format(LONG_DATE)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn sample() -> CertificateData {
        CertificateData {
            certificate_number: "CERT-0A1B2C3D".into(),
            participant_name: "John Doe".into(),
            event_title: "Tech Conference 2026".into(),
            event_type: "seminar".into(),
            event_date: "December 15, 2026".into(),
            event_venue: "Main Auditorium".into(),
            issue_date: "August 06, 2026".into(),
        }
    }

    #[test]
    fn html_renderer_embeds_all_contract_fields() {
        let rendered = HtmlCertificateRenderer.render(&sample()).unwrap();
        let body = String::from_utf8(rendered.body.to_vec()).unwrap();
        for field in [
            "CERT-0A1B2C3D",
            "John Doe",
            "Tech Conference 2026",
            "seminar",
            "December 15, 2026",
            "Main Auditorium",
            "August 06, 2026",
        ] {
            assert!(body.contains(field), "missing {field}");
        }
        assert_eq!(rendered.extension, "html");
        assert_eq!(rendered.content_type, "text/html; charset=utf-8");
    }

    #[test]
    fn plain_renderer_embeds_all_contract_fields() {
        let rendered = PlainTextCertificateRenderer.render(&sample()).unwrap();
        let body = String::from_utf8(rendered.body.to_vec()).unwrap();
        for field in [
            "CERTIFICATE OF PARTICIPATION",
            "CERT-0A1B2C3D",
            "John Doe",
            "Tech Conference 2026",
            "seminar",
            "December 15, 2026",
            "Main Auditorium",
            "August 06, 2026",
        ] {
            assert!(body.contains(field), "missing {field}");
        }
        assert_eq!(rendered.extension, "txt");
    }

    #[test]
    fn certificate_number_is_deterministic() {
        let id = Uuid::new_v4();
        assert_eq!(certificate_number(id), certificate_number(id));
        assert!(certificate_number(id).starts_with("CERT-"));
        assert_eq!(certificate_number(id).len(), "CERT-".len() + 8);
    }

    #[test]
    fn artifact_keys_do_not_collide() {
        let id = Uuid::new_v4();
        let a = artifact_key(id, "html");
        let b = artifact_key(id, "html");
        assert_ne!(a, b);
        assert!(a.starts_with(&format!("certificates/{id}-")));
        assert!(a.ends_with(".html"));
    }

    #[test]
    fn long_date_format_is_month_day_year() {
        let date = datetime!(2026-12-05 10:00 UTC);
        assert_eq!(format_long_date(date).unwrap(), "December 05, 2026");
    }

    #[test]
    fn renderer_selection_falls_back_to_plain() {
        assert_eq!(renderer_from_config("html").format_name(), "html");
        assert_eq!(renderer_from_config("text").format_name(), "text");
        assert_eq!(renderer_from_config("pdf").format_name(), "text");
    }
}
