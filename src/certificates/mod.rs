pub mod renderer;

pub use renderer::{
    artifact_key, certificate_number, format_long_date, renderer_from_config, CertificateData,
    CertificateRenderer, HtmlCertificateRenderer, PlainTextCertificateRenderer,
    RenderedCertificate,
};
