//! A preview surface that draws screens as indented text.

use std::io::{self, Write};

use glimpse_engine::{PreviewSurface, Screen};
use glimpse_script::{Object, Value};
use tracing::warn;

pub struct ConsoleSurface<W> {
    out: W,
}

impl ConsoleSurface<io::Stderr> {
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }
}

impl<W: Write> ConsoleSurface<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, text: &str) {
        if let Err(e) = self.out.write_all(text.as_bytes()).and_then(|()| self.out.flush()) {
            warn!(error = %e, "Failed to draw preview");
        }
    }
}

impl<W: Write> PreviewSurface for ConsoleSurface<W> {
    fn show(&mut self) {
        self.emit("== preview opened ==\n");
    }

    fn hide(&mut self) {
        self.emit("== preview closed ==\n");
    }

    fn display(&mut self, screen: &Screen) {
        let mut text = String::new();
        match screen {
            Screen::Page(page) => render_object(page, 0, &mut text),
            Screen::Error(error) => {
                text.push_str(&format!("!! {}: {}\n", error.title, error.message));
                if let Some(detail) = &error.detail {
                    text.push_str(&format!("   {}\n", detail));
                }
            }
        }
        self.emit(&text);
    }
}

fn render_object(obj: &Object, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    out.push_str(&format!("{}<{}", indent, obj.qualified_name()));
    let mut nested = Vec::new();
    for (name, value) in &obj.properties {
        match value {
            Value::Object(child) => nested.push((name, child)),
            Value::Null => {}
            other => out.push_str(&format!(" {}={:?}", name, other.to_string_value())),
        }
    }
    out.push_str(">\n");

    for (name, child) in nested {
        out.push_str(&format!("{}  {}:\n", indent, name));
        render_object(child, depth + 2, out);
    }
    for child in obj.children.iter().flatten() {
        match child {
            Value::Object(child) => render_object(child, depth + 1, out),
            other => out.push_str(&format!("{}  {}\n", indent, other.to_string_value())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glimpse_engine::ErrorViewModel;
    use glimpse_script::ObjectKind;

    #[test]
    fn test_renders_tree() {
        let mut label = Object::new("ui", "Label", ObjectKind::View);
        label.properties.insert("Text".to_string(), Value::String("Hi".to_string()));
        let mut page = Object::new("", "ContentPage", ObjectKind::Page);
        page.properties.insert("Content".to_string(), Value::Object(label));

        let mut surface = ConsoleSurface::new(Vec::new());
        surface.display(&Screen::Page(page));
        let text = String::from_utf8(surface.into_inner()).unwrap();
        assert_eq!(text, "<ContentPage>\n  Content:\n    <ui.Label Text=\"Hi\">\n");
    }

    #[test]
    fn test_renders_error() {
        let mut surface = ConsoleSurface::new(Vec::new());
        surface.display(&Screen::Error(ErrorViewModel::new("Oops", "bad").with_detail("trace")));
        let text = String::from_utf8(surface.into_inner()).unwrap();
        assert_eq!(text, "!! Oops: bad\n   trace\n");
    }
}
