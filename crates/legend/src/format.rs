use foundation::format_number;
use serde::{Deserialize, Serialize};

/// How numeric stop values are written into legend labels.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NumberFormat {
    /// Group integer digits with `,`.
    pub thousands_separator: bool,
    /// Fixed fraction digits; `None` prints the shortest exact form.
    pub decimals: Option<usize>,
    pub prefix: String,
    pub suffix: String,
}

impl NumberFormat {
    pub fn grouped() -> Self {
        Self {
            thousands_separator: true,
            ..Self::default()
        }
    }

    pub fn format(&self, n: f64) -> String {
        let digits = match self.decimals {
            Some(d) => format!("{:.*}", d, n.abs()),
            None => format_number(n.abs()),
        };
        let digits = if self.thousands_separator {
            group_thousands(&digits)
        } else {
            digits
        };
        let sign = if n < 0.0 && digits.bytes().any(|b| matches!(b, b'1'..=b'9')) {
            "-"
        } else {
            ""
        };
        format!("{sign}{}{digits}{}", self.prefix, self.suffix)
    }
}

fn group_thousands(digits: &str) -> String {
    let (int, frac) = match digits.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (digits, None),
    };
    if !int.bytes().all(|b| b.is_ascii_digit()) {
        return digits.to_string();
    }
    let mut out = String::with_capacity(int.len() + int.len() / 3 + 1);
    for (i, ch) in int.chars().enumerate() {
        if i > 0 && (int.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if let Some(frac) = frac {
        out.push('.');
        out.push_str(frac);
    }
    out
}
