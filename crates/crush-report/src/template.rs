//! HTML document for a personality report.

use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use crush_core::Applicant;
use pulldown_cmark::{html, Event, Options, Parser};

use crate::sections::ReportSection;

const LOGO_FILE: &str = "logo.png";
const FONT_FILES: &[(&str, &str)] = &[
    ("brand.otf", "font/otf"),
    ("brand.ttf", "font/ttf"),
    ("brand.woff2", "font/woff2"),
];

/// Dotted grid with faint ruled lines, tiled behind every page.
const BACKGROUND_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="24" height="24" viewBox="0 0 24 24"><circle cx="2" cy="2" r="1" fill="#f3c6d3"/><line x1="0" y1="23.5" x2="24" y2="23.5" stroke="#fbe9ee" stroke-width="0.5"/></svg>"##;

const STYLES: &str = r"
  body { margin: 0; color: #3a2b30; font-size: 11pt; line-height: 1.7;
         font-family: 'CrushBrand', 'Noto Sans SC', 'PingFang SC', sans-serif;
         background-repeat: repeat; }
  header { display: flex; align-items: center; gap: 16px;
           border-bottom: 2px solid #e8a0b4; padding-bottom: 12px; margin-bottom: 20px; }
  header img { height: 48px; }
  header h1 { margin: 0; font-size: 20pt; color: #c2537a; }
  .meta { display: grid; grid-template-columns: repeat(2, 1fr); gap: 4px 24px;
          margin-bottom: 24px; font-size: 10pt; }
  .meta dt { font-weight: bold; color: #8a6570; }
  .meta dd { margin: 0 0 4px 0; }
  section { break-inside: avoid-page; margin-bottom: 18px; }
  section h2 { font-size: 13pt; color: #c2537a; margin: 0 0 6px 0; }
  section p { margin: 0 0 8px 0; }
";

/// Logo and font embedded as data URIs. A missing file disables that asset.
#[derive(Debug, Clone, Default)]
pub struct BrandingAssets {
    pub logo_data_uri: Option<String>,
    pub font_data_uri: Option<String>,
}

impl BrandingAssets {
    /// Loads `logo.png` and the first `brand.{otf,ttf,woff2}` found in `dir`.
    #[must_use]
    pub fn load(dir: &Path) -> Self {
        let logo_data_uri = read_data_uri(&dir.join(LOGO_FILE), "image/png");
        if logo_data_uri.is_none() {
            tracing::warn!(dir = %dir.display(), "report logo not found, rendering without it");
        }

        let font_data_uri = FONT_FILES
            .iter()
            .find_map(|(file, mime)| read_data_uri(&dir.join(file), mime));
        if font_data_uri.is_none() {
            tracing::warn!(dir = %dir.display(), "brand font not found, using system fonts");
        }

        Self {
            logo_data_uri,
            font_data_uri,
        }
    }
}

fn read_data_uri(path: &Path, mime: &str) -> Option<String> {
    let bytes = std::fs::read(path).ok()?;
    Some(format!("data:{mime};base64,{}", BASE64.encode(bytes)))
}

/// Everything the template needs for one applicant.
pub struct ReportView<'a> {
    pub applicant: &'a Applicant,
    pub generated_at: DateTime<Utc>,
    pub sections: &'a [ReportSection],
}

/// Renders Markdown to HTML with every soft line break kept as `<br />`.
///
/// Raw HTML in the input is escaped, not passed through.
#[must_use]
pub fn markdown_to_html(markdown: &str) -> String {
    let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH;
    let events = Parser::new_ext(markdown, options).map(|event| match event {
        Event::SoftBreak => Event::HardBreak,
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        other => other,
    });
    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, events);
    out
}

#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// Builds the full HTML document. Page size, margins and the footer are
/// applied by the renderer, not here.
#[must_use]
pub fn render_html(view: &ReportView<'_>, assets: &BrandingAssets) -> String {
    let applicant = view.applicant;
    let name = escape_html(&applicant.name);

    let mut doc = String::with_capacity(16 * 1024);
    doc.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    doc.push_str(&format!("<title>{name} - Personality Report</title>\n"));
    doc.push_str("<style>\n");
    if let Some(font) = &assets.font_data_uri {
        doc.push_str(&format!(
            "  @font-face {{ font-family: 'CrushBrand'; src: url('{font}'); }}\n"
        ));
    }
    doc.push_str(STYLES);
    doc.push_str(&format!(
        "  body {{ background-image: url('data:image/svg+xml;base64,{}'); }}\n",
        BASE64.encode(BACKGROUND_SVG)
    ));
    doc.push_str("</style>\n</head>\n<body>\n<header>\n");
    if let Some(logo) = &assets.logo_data_uri {
        doc.push_str(&format!("  <img src=\"{logo}\" alt=\"Crush &amp; Beyond\">\n"));
    }
    doc.push_str(&format!(
        "  <h1>{name} · Personality Report</h1>\n</header>\n"
    ));

    doc.push_str("<dl class=\"meta\">\n");
    let birth = if applicant.zodiac.trim().is_empty() {
        applicant.birth_date.clone()
    } else {
        format!("{} ({})", applicant.birth_date, applicant.zodiac)
    };
    let generated = view.generated_at.format("%Y-%m-%d %H:%M UTC").to_string();
    for (label, value) in [
        ("Name", applicant.name.as_str()),
        ("Gender", applicant.gender.label()),
        ("Born", birth.as_str()),
        ("Location", applicant.location.as_str()),
        ("Generated", generated.as_str()),
    ] {
        doc.push_str(&format!(
            "  <div><dt>{label}</dt><dd>{}</dd></div>\n",
            escape_html(value)
        ));
    }
    doc.push_str("</dl>\n");

    for section in view.sections {
        doc.push_str("<section>\n");
        doc.push_str(&format!("  <h2>{}</h2>\n", escape_html(&section.title)));
        doc.push_str(&markdown_to_html(&section.content));
        doc.push_str("</section>\n");
    }

    doc.push_str("</body>\n</html>\n");
    doc
}
