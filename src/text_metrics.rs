use fontdb::{Database, Family, Query, Stretch, Style, Weight};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::sync::Mutex;
use ttf_parser::Face;

static TEXT_MEASURER: Lazy<Mutex<TextMeasurer>> = Lazy::new(|| Mutex::new(TextMeasurer::new()));

/// Horizontal advance and line box of a single line of text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextExtent {
    pub width: f32,
    pub height: f32,
}

pub fn measure_text(text: &str, font_size: f32, font_family: &str, bold: bool) -> Option<TextExtent> {
    if font_size <= 0.0 {
        return Some(TextExtent {
            width: 0.0,
            height: 0.0,
        });
    }
    let mut guard = TEXT_MEASURER.lock().ok()?;
    guard.measure(text, font_size, font_family, bold)
}

struct TextMeasurer {
    db: Database,
    loaded_system_fonts: bool,
    cache: HashMap<String, Option<FontFace>>,
}

impl TextMeasurer {
    fn new() -> Self {
        Self {
            db: Database::new(),
            loaded_system_fonts: false,
            cache: HashMap::new(),
        }
    }

    fn measure(&mut self, text: &str, font_size: f32, font_family: &str, bold: bool) -> Option<TextExtent> {
        let key = face_key(font_family, bold);
        if !self.cache.contains_key(&key) {
            let face = self.load_face(font_family, bold, &key);
            self.cache.insert(key.clone(), face);
        }
        let face = self.cache.get_mut(&key).and_then(|face| face.as_mut())?;
        let normalized = text.replace('\t', "    ");
        Some(TextExtent {
            width: face.measure_width(&normalized, font_size),
            height: face.line_height(font_size),
        })
    }

    fn load_face(&mut self, font_family: &str, bold: bool, key: &str) -> Option<FontFace> {
        if let Some(face) = load_cached_face(key) {
            return Some(face);
        }

        let names: Vec<&str> = font_family
            .split(',')
            .map(|part| part.trim().trim_matches('"').trim_matches('\''))
            .filter(|part| !part.is_empty())
            .collect();
        let mut families: Vec<Family<'_>> = names
            .iter()
            .map(|name| match name.to_ascii_lowercase().as_str() {
                "serif" => Family::Serif,
                "sans-serif" | "system-ui" => Family::SansSerif,
                "monospace" => Family::Monospace,
                _ => Family::Name(name),
            })
            .collect();
        if families.is_empty() {
            families.push(Family::SansSerif);
        }

        if !self.loaded_system_fonts {
            self.db.load_system_fonts();
            self.loaded_system_fonts = true;
        }

        let query = Query {
            families: &families,
            weight: if bold { Weight::BOLD } else { Weight::NORMAL },
            stretch: Stretch::Normal,
            style: Style::Normal,
        };
        let id = self.db.query(&query)?;
        let mut loaded: Option<FontFace> = None;
        self.db.with_face_data(id, |data, index| {
            let bytes = data.to_vec();
            if let Some(face) = FontFace::parse(&bytes, index) {
                if let Some((font_path, meta_path)) = cache_paths(key)
                    && !font_path.exists()
                {
                    if let Some(parent) = font_path.parent() {
                        let _ = fs::create_dir_all(parent);
                    }
                    let _ = fs::write(&font_path, &bytes);
                    let _ = fs::write(&meta_path, index.to_string());
                }
                loaded = Some(face);
            }
        });
        loaded
    }
}

struct FontFace {
    data: Vec<u8>,
    index: u32,
    units_per_em: u16,
    ascender: i16,
    descender: i16,
    ascii_advances: [u16; 128],
    advance_cache: HashMap<char, Option<u16>>,
}

impl FontFace {
    fn parse(data: &[u8], index: u32) -> Option<Self> {
        let face = Face::parse(data, index).ok()?;
        let mut ascii_advances = [0u16; 128];
        for byte in 0u8..=127 {
            if let Some(glyph_id) = face.glyph_index(byte as char) {
                ascii_advances[byte as usize] = face.glyph_hor_advance(glyph_id).unwrap_or(0);
            }
        }
        Some(Self {
            data: data.to_vec(),
            index,
            units_per_em: face.units_per_em().max(1),
            ascender: face.ascender(),
            descender: face.descender(),
            ascii_advances,
            advance_cache: HashMap::new(),
        })
    }

    fn line_height(&self, font_size: f32) -> f32 {
        let scale = font_size / self.units_per_em as f32;
        (self.ascender as f32 - self.descender as f32) * scale
    }

    fn measure_width(&mut self, text: &str, font_size: f32) -> f32 {
        let scale = font_size / self.units_per_em as f32;
        let fallback = font_size * 0.56;
        let mut width = 0.0f32;

        // Parsed lazily: most labels are package identifiers and never leave ASCII.
        let mut face: Option<Face<'_>> = None;
        for ch in text.chars() {
            if ch == '\n' {
                continue;
            }
            let advance = if ch.is_ascii() {
                Some(self.ascii_advances[ch as usize]).filter(|advance| *advance > 0)
            } else if let Some(cached) = self.advance_cache.get(&ch) {
                *cached
            } else {
                if face.is_none() {
                    face = Face::parse(&self.data, self.index).ok();
                }
                let value = face.as_ref().and_then(|face| {
                    face.glyph_index(ch)
                        .and_then(|glyph| face.glyph_hor_advance(glyph))
                });
                self.advance_cache.insert(ch, value);
                value
            };
            width += match advance {
                Some(advance) => advance as f32 * scale,
                None => fallback,
            };
        }

        width.max(0.0)
    }
}

fn face_key(font_family: &str, bold: bool) -> String {
    let trimmed = font_family.trim();
    let family = if trimmed.is_empty() { "sans-serif" } else { trimmed };
    if bold {
        format!("{family}#bold")
    } else {
        family.to_string()
    }
}

fn cache_paths(key: &str) -> Option<(PathBuf, PathBuf)> {
    let base = std::env::var_os("XDG_CACHE_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".cache")))?;
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    key.hash(&mut hasher);
    let hash = hasher.finish();
    let dir = base.join("deptree").join("font-cache");
    let font_path = dir.join(format!("{hash:x}.font"));
    let meta_path = dir.join(format!("{hash:x}.meta"));
    Some((font_path, meta_path))
}

fn load_cached_face(key: &str) -> Option<FontFace> {
    let (font_path, meta_path) = cache_paths(key)?;
    if !font_path.exists() || !meta_path.exists() {
        return None;
    }
    let bytes = fs::read(font_path).ok()?;
    let index: u32 = fs::read_to_string(meta_path).ok()?.trim().parse().ok()?;
    FontFace::parse(&bytes, index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bold_faces_get_their_own_cache_slot() {
        assert_eq!(face_key("Arial", true), "Arial#bold");
        assert_eq!(face_key("  ", false), "sans-serif");
    }

    #[test]
    fn zero_font_size_measures_nothing() {
        let extent = measure_text("anything", 0.0, "Arial", true).unwrap();
        assert_eq!(extent.width, 0.0);
        assert_eq!(extent.height, 0.0);
    }
}
