// ============================================================
// Layer 4 — Text Preprocessor
// ============================================================
// Cleans raw corpus text before tokenisation.
//
// Stance corpora are mostly scraped social media posts and
// carry a lot of whitespace noise:
//   - Non-breaking spaces (U+00A0) and zero-width spaces
//   - Byte order marks left over from spreadsheet exports
//   - Embedded \r\n, tabs and other control characters
//   - Runs of spaces from copy-pasting
//
// A sample is a single line of text to the model, so every
// whitespace variant is collapsed into one plain space.
// Hashtags, mentions and "RT @user:" markers are kept; they
// often carry the stance.

pub struct Preprocessor;

impl Preprocessor {
    pub fn new() -> Self {
        Self
    }

    /// Clean a raw text field. Returns an owned, single-line String.
    pub fn clean(&self, text: &str) -> String {
        let mut out        = String::with_capacity(text.len());
        let mut last_space = true; // swallows leading whitespace

        for c in text.chars() {
            let c = match c {
                '\u{00A0}' | '\u{200B}' | '\u{FEFF}' => ' ',
                c if c.is_whitespace() || c.is_control() => ' ',
                c => c,
            };
            if c == ' ' {
                if !last_space {
                    out.push(' ');
                }
                last_space = true;
            } else {
                out.push(c);
                last_space = false;
            }
        }

        // At most one trailing space can remain
        if out.ends_with(' ') {
            out.pop();
        }
        out
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new()
    }
}
