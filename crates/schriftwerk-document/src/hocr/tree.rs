// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// hOCR document tree — page → column area → paragraph → line → word.
//
// Built with a streaming `quick-xml` pass. Structure is recognised from the
// `class` attribute, so both a bare `div.ocr_page` payload and a complete
// XHTML document (with `html`/`head`/`body` wrappers) parse the same way. The
// tree is immutable once built; each node keeps its raw `title` and decodes it
// on demand, since most callers need either text or geometry but not both.

use std::borrow::Cow;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, BytesText, Event};
use schriftwerk_core::error::{Result, SchriftwerkError};
use tracing::{debug, instrument};

use super::title::{TitleAttributes, parse_title};

/// Classes Tesseract uses for line-level elements.
const LINE_CLASSES: &[&str] = &[
    "ocr_line",
    "ocrx_line",
    "ocr_header",
    "ocr_caption",
    "ocr_textfloat",
];

/// A recognised word (`span.ocrx_word`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OcrWord {
    pub id: String,
    pub title: String,
    /// Character data exactly as it appeared, entities unescaped.
    pub content: String,
}

/// A text line (`span.ocr_line` and friends).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OcrLine {
    pub id: String,
    pub class: String,
    pub title: String,
    pub words: Vec<OcrWord>,
}

/// A paragraph (`p.ocr_par`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OcrParagraph {
    pub id: String,
    pub lang: String,
    pub title: String,
    pub lines: Vec<OcrLine>,
}

/// A column area (`div.ocr_carea`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OcrColumnArea {
    pub id: String,
    pub title: String,
    pub paragraphs: Vec<OcrParagraph>,
}

/// One OCR'd page (`div.ocr_page`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OcrPage {
    pub id: String,
    pub title: String,
    pub areas: Vec<OcrColumnArea>,
}

/// Every page found in one hOCR payload, in document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HocrDocument {
    pub pages: Vec<OcrPage>,
}

impl OcrWord {
    /// The word's text with surrounding whitespace removed.
    pub fn text(&self) -> &str {
        self.content.trim()
    }

    /// Properties parsed from this element's `title` attribute.
    pub fn attributes(&self) -> TitleAttributes {
        parse_title(&self.title)
    }
}

impl OcrLine {
    /// Words joined by single spaces.
    pub fn text(&self) -> String {
        join(self.words.iter().map(|w| Cow::Borrowed(w.text())), " ")
    }

    /// Properties parsed from this element's `title` attribute.
    pub fn attributes(&self) -> TitleAttributes {
        parse_title(&self.title)
    }
}

impl OcrParagraph {
    /// Lines joined by newlines.
    pub fn text(&self) -> String {
        join(self.lines.iter().map(|l| Cow::Owned(l.text())), "\n")
    }

    /// Properties parsed from this element's `title` attribute.
    pub fn attributes(&self) -> TitleAttributes {
        parse_title(&self.title)
    }
}

impl OcrColumnArea {
    /// Paragraphs separated by blank lines.
    pub fn text(&self) -> String {
        join(self.paragraphs.iter().map(|p| Cow::Owned(p.text())), "\n\n")
    }

    /// Properties parsed from this element's `title` attribute.
    pub fn attributes(&self) -> TitleAttributes {
        parse_title(&self.title)
    }
}

impl OcrPage {
    /// Parse a payload and return its first page.
    pub fn parse(hocr: &str) -> Result<Self> {
        HocrDocument::parse(hocr)?
            .pages
            .into_iter()
            .next()
            .ok_or_else(|| SchriftwerkError::HocrParse("no ocr_page element found".into()))
    }

    /// Column areas separated by blank lines.
    pub fn text(&self) -> String {
        join(self.areas.iter().map(|a| Cow::Owned(a.text())), "\n\n")
    }

    /// Properties parsed from this element's `title` attribute.
    pub fn attributes(&self) -> TitleAttributes {
        parse_title(&self.title)
    }

    /// Total number of words on the page.
    pub fn word_count(&self) -> usize {
        self.areas
            .iter()
            .flat_map(|a| &a.paragraphs)
            .flat_map(|p| &p.lines)
            .map(|l| l.words.len())
            .sum()
    }
}

impl HocrDocument {
    /// Parse an hOCR payload.
    ///
    /// Malformed XML fails the whole payload; no partially built pages are
    /// returned.
    #[instrument(skip_all, fields(bytes_len = hocr.len()))]
    pub fn parse(hocr: &str) -> Result<Self> {
        let mut reader = Reader::from_str(hocr);
        reader.trim_text(false);

        let mut builder = TreeBuilder::default();
        loop {
            let event = reader.read_event().map_err(|err| {
                SchriftwerkError::HocrParse(format!(
                    "malformed XML at byte {}: {}",
                    reader.buffer_position(),
                    err
                ))
            })?;
            match event {
                Event::Start(element) => builder.open(&element)?,
                Event::Empty(element) => {
                    builder.open(&element)?;
                    builder.close()?;
                }
                Event::End(_) => builder.close()?,
                Event::Text(text) => builder.text(&text)?,
                Event::CData(data) => {
                    let raw = data.into_inner();
                    let text = std::str::from_utf8(&raw).map_err(|err| {
                        SchriftwerkError::HocrParse(format!("CDATA is not UTF-8: {err}"))
                    })?;
                    builder.push_text(text);
                }
                Event::Eof => break,
                _ => {}
            }
        }

        let document = builder.finish()?;
        debug!(pages = document.pages.len(), "hOCR document parsed");
        Ok(document)
    }
}

fn join<'a>(parts: impl Iterator<Item = Cow<'a, str>>, separator: &str) -> String {
    let mut out = String::new();
    for (index, part) in parts.enumerate() {
        if index > 0 {
            out.push_str(separator);
        }
        out.push_str(&part);
    }
    out
}

// -- Builder ------------------------------------------------------------------

/// What an open element contributes to the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Page,
    Area,
    Paragraph,
    Line,
    Word,
    Other,
}

/// The attributes the tree cares about.
#[derive(Debug, Default)]
struct ElementAttrs {
    id: String,
    class: String,
    title: String,
    lang: String,
}

impl ElementAttrs {
    fn read(element: &BytesStart<'_>) -> Result<Self> {
        let mut attrs = Self::default();
        for attr in element.attributes() {
            let attr = attr.map_err(|err| {
                SchriftwerkError::HocrParse(format!("invalid attribute: {err}"))
            })?;
            let value = attr
                .unescape_value()
                .map_err(|err| {
                    SchriftwerkError::HocrParse(format!("invalid attribute value: {err}"))
                })?
                .into_owned();
            match attr.key.as_ref() {
                b"id" => attrs.id = value,
                b"class" => attrs.class = value,
                b"title" => attrs.title = value,
                b"lang" | b"xml:lang" => attrs.lang = value,
                _ => {}
            }
        }
        Ok(attrs)
    }

    fn has_class(&self, class: &str) -> bool {
        self.class.split_whitespace().any(|c| c == class)
    }

    fn has_any_class(&self, classes: &[&str]) -> bool {
        classes.iter().any(|class| self.has_class(class))
    }
}

/// Incrementally assembles the tree from start/end/text events.
///
/// Only one node per level can be open at a time, so each level is a single
/// `Option` and `stack` records the role of every open element.
#[derive(Default)]
struct TreeBuilder {
    pages: Vec<OcrPage>,
    page: Option<OcrPage>,
    area: Option<OcrColumnArea>,
    paragraph: Option<OcrParagraph>,
    line: Option<OcrLine>,
    word: Option<OcrWord>,
    stack: Vec<Role>,
}

impl TreeBuilder {
    fn classify(&self, attrs: &ElementAttrs) -> Role {
        if self.page.is_none() {
            return if attrs.has_class("ocr_page") {
                Role::Page
            } else {
                Role::Other
            };
        }
        if self.area.is_none() {
            return if attrs.has_class("ocr_carea") {
                Role::Area
            } else {
                Role::Other
            };
        }
        if self.paragraph.is_none() {
            return if attrs.has_class("ocr_par") {
                Role::Paragraph
            } else {
                Role::Other
            };
        }
        if self.line.is_none() {
            return if attrs.has_any_class(LINE_CLASSES) {
                Role::Line
            } else {
                Role::Other
            };
        }
        // Inside a line: an explicit word, or any direct child element.
        if self.word.is_none()
            && (attrs.has_class("ocrx_word") || self.stack.last() == Some(&Role::Line))
        {
            return Role::Word;
        }
        Role::Other
    }

    fn open(&mut self, element: &BytesStart<'_>) -> Result<()> {
        let attrs = ElementAttrs::read(element)?;
        let role = self.classify(&attrs);
        match role {
            Role::Page => {
                self.page = Some(OcrPage {
                    id: attrs.id,
                    title: attrs.title,
                    areas: Vec::new(),
                })
            }
            Role::Area => {
                self.area = Some(OcrColumnArea {
                    id: attrs.id,
                    title: attrs.title,
                    paragraphs: Vec::new(),
                })
            }
            Role::Paragraph => {
                self.paragraph = Some(OcrParagraph {
                    id: attrs.id,
                    lang: attrs.lang,
                    title: attrs.title,
                    lines: Vec::new(),
                })
            }
            Role::Line => {
                self.line = Some(OcrLine {
                    id: attrs.id,
                    class: attrs.class,
                    title: attrs.title,
                    words: Vec::new(),
                })
            }
            Role::Word => {
                self.word = Some(OcrWord {
                    id: attrs.id,
                    title: attrs.title,
                    content: String::new(),
                })
            }
            Role::Other => {}
        }
        self.stack.push(role);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let role = self.stack.pop().ok_or_else(|| {
            SchriftwerkError::HocrParse("closing tag without matching opening tag".into())
        })?;
        match role {
            Role::Word => {
                if let (Some(word), Some(line)) = (self.word.take(), self.line.as_mut()) {
                    line.words.push(word);
                }
            }
            Role::Line => {
                if let (Some(line), Some(paragraph)) = (self.line.take(), self.paragraph.as_mut())
                {
                    paragraph.lines.push(line);
                }
            }
            Role::Paragraph => {
                if let (Some(paragraph), Some(area)) = (self.paragraph.take(), self.area.as_mut())
                {
                    area.paragraphs.push(paragraph);
                }
            }
            Role::Area => {
                if let (Some(area), Some(page)) = (self.area.take(), self.page.as_mut()) {
                    page.areas.push(area);
                }
            }
            Role::Page => {
                if let Some(page) = self.page.take() {
                    self.pages.push(page);
                }
            }
            Role::Other => {}
        }
        Ok(())
    }

    fn text(&mut self, text: &BytesText<'_>) -> Result<()> {
        // Character data outside words carries nothing we keep.
        if self.word.is_none() {
            return Ok(());
        }
        let unescaped = text
            .unescape()
            .map_err(|err| SchriftwerkError::HocrParse(format!("invalid character data: {err}")))?;
        self.push_text(&unescaped);
        Ok(())
    }

    fn push_text(&mut self, text: &str) {
        if let Some(word) = self.word.as_mut() {
            word.content.push_str(text);
        }
    }

    fn finish(self) -> Result<HocrDocument> {
        if !self.stack.is_empty() {
            return Err(SchriftwerkError::HocrParse(format!(
                "unexpected end of document with {} unclosed element(s)",
                self.stack.len()
            )));
        }
        Ok(HocrDocument { pages: self.pages })
    }
}
