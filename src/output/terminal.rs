//! ANSI colors for run results
//!
//! Colors are 256-color foreground codes. Everything goes through a
//! [`Painter`], which passes text through untouched when colors are off.

pub mod colors {
    pub const GREY: u8 = 102;      // #7D7D7D - timings, missing status
    pub const AQUA: u8 = 109;      // #7A9EB5 - 1xx, response bodies
    pub const ORANGE: u8 = 208;    // #F2913D - 4xx, PUT/PATCH, skipped checks
    pub const RED: u8 = 167;       // #E34F45 - 5xx, DELETE, failures
    pub const BLUE: u8 = 68;       // #426BD1 - request names
    pub const PINK: u8 = 176;      // #DE85DE - selectors
    pub const GREEN: u8 = 71;      // #63C27A - 2xx, GET, passes
    pub const YELLOW: u8 = 185;    // #CCCC3D - 3xx, POST
}

pub const RESET: &str = "\x1b[0m";

/// Role of a piece of output text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    Pass,
    Fail,
    Warn,
    Name,
    Selector,
    Dim,
    Body,
}

impl Style {
    fn code(self) -> String {
        match self {
            Style::Pass => bold_fg(colors::GREEN),
            Style::Fail => bold_fg(colors::RED),
            Style::Warn => bold_fg(colors::ORANGE),
            Style::Name => fg(colors::BLUE),
            Style::Selector => fg(colors::PINK),
            Style::Dim => fg(colors::GREY),
            Style::Body => fg(colors::AQUA),
        }
    }
}

#[inline]
pub fn fg(color: u8) -> String {
    format!("\x1b[38;5;{}m", color)
}

#[inline]
pub fn bold_fg(color: u8) -> String {
    format!("\x1b[1;38;5;{}m", color)
}

fn status_color(code: u16) -> u8 {
    match code / 100 {
        1 => colors::AQUA,
        2 => colors::GREEN,
        3 => colors::YELLOW,
        4 => colors::ORANGE,
        5 => colors::RED,
        _ => colors::GREY,
    }
}

fn method_color(method: &str) -> u8 {
    match method.to_uppercase().as_str() {
        "GET" | "HEAD" | "OPTIONS" => colors::GREEN,
        "POST" => colors::YELLOW,
        "PUT" | "PATCH" => colors::ORANGE,
        "DELETE" => colors::RED,
        _ => colors::GREY,
    }
}

/// Applies colors only when they are enabled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Painter {
    enabled: bool,
}

impl Painter {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// No colors
    pub fn plain() -> Self {
        Self::new(false)
    }

    /// Colors when stdout is a terminal and `NO_COLOR` is unset
    pub fn detect() -> Self {
        Self::new(atty::is(atty::Stream::Stdout) && std::env::var_os("NO_COLOR").is_none())
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn paint(&self, text: &str, style: Style) -> String {
        self.wrap(text, style.code())
    }

    /// Status code colored by class; `---` when there was no response
    pub fn status(&self, code: Option<u16>) -> String {
        match code {
            Some(code) => self.wrap(&code.to_string(), bold_fg(status_color(code))),
            None => self.paint("---", Style::Dim),
        }
    }

    /// Upper-cased method colored by verb
    pub fn method(&self, method: &str) -> String {
        let method = method.to_uppercase();
        let color = method_color(&method);
        self.wrap(&method, bold_fg(color))
    }

    fn wrap(&self, text: &str, code: String) -> String {
        if self.enabled {
            format!("{}{}{}", code, text, RESET)
        } else {
            text.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fg_color() {
        assert_eq!(fg(71), "\x1b[38;5;71m");
        assert_eq!(bold_fg(71), "\x1b[1;38;5;71m");
    }

    #[test]
    fn test_plain_painter_is_identity() {
        let painter = Painter::plain();
        assert!(!painter.enabled());
        assert_eq!(painter.paint("FAIL", Style::Fail), "FAIL");
        assert_eq!(painter.status(Some(404)), "404");
        assert_eq!(painter.status(None), "---");
        assert_eq!(painter.method("post"), "POST");
    }

    #[test]
    fn test_styles() {
        let painter = Painter::new(true);
        assert_eq!(painter.paint("ok", Style::Pass), "\x1b[1;38;5;71mok\x1b[0m");
        assert_eq!(painter.paint("FAIL", Style::Fail), "\x1b[1;38;5;167mFAIL\x1b[0m");
        assert_eq!(painter.paint("id", Style::Selector), "\x1b[38;5;176mid\x1b[0m");
    }

    #[test]
    fn test_status_and_method_colors() {
        let painter = Painter::new(true);
        assert_eq!(painter.status(Some(201)), format!("{}201{}", bold_fg(colors::GREEN), RESET));
        assert_eq!(painter.status(Some(503)), format!("{}503{}", bold_fg(colors::RED), RESET));
        assert_eq!(painter.status(None), format!("{}---{}", fg(colors::GREY), RESET));
        assert_eq!(painter.method("delete"), format!("{}DELETE{}", bold_fg(colors::RED), RESET));
        assert_eq!(painter.method("PATCH"), format!("{}PATCH{}", bold_fg(colors::ORANGE), RESET));
    }
}
