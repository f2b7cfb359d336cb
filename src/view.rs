use std::fmt;

/// The three screens the shell can show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Gallery,
    Upload,
    Results,
}

impl View {
    /// Accepts `#/upload`, `/upload` or `upload`; anything unrecognised is the gallery.
    pub fn from_fragment(fragment: &str) -> Self {
        let name = fragment.trim_start_matches('#').trim_start_matches('/').trim_end_matches('/');
        match name {
            "upload" => View::Upload,
            "results" => View::Results,
            _ => View::Gallery,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            View::Gallery => "gallery",
            View::Upload => "upload",
            View::Results => "results",
        }
    }

    pub fn fragment(self) -> String {
        format!("#/{}", self.name())
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}
