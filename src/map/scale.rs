//! Threshold colour scales.
use log::warn;

/// An RGB colour
pub type Rgb = [u8; 3];

/// Evenly spaced stops of the viridis colour map, from dark purple to yellow
const VIRIDIS: [Rgb; 9] = [
    [68, 1, 84],
    [72, 40, 120],
    [62, 73, 137],
    [49, 104, 142],
    [38, 130, 142],
    [31, 158, 137],
    [53, 183, 121],
    [110, 206, 88],
    [253, 231, 37],
];

/// Sample the viridis colour map at `t` in [0, 1]
fn viridis_at(t: f64) -> Rgb {
    let position = t.clamp(0.0, 1.0) * (VIRIDIS.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = (lower + 1).min(VIRIDIS.len() - 1);
    let weight = position - lower as f64;

    let mut colour = [0; 3];
    for (channel, value) in colour.iter_mut().enumerate() {
        let from = f64::from(VIRIDIS[lower][channel]);
        let to = f64::from(VIRIDIS[upper][channel]);
        *value = (from + (to - from) * weight).round() as u8;
    }

    colour
}

/// `n` evenly spaced viridis colours, from dark to light
pub fn viridis(n: usize) -> Vec<Rgb> {
    match n {
        0 => Vec::new(),
        1 => vec![viridis_at(0.0)],
        _ => (0..n)
            .map(|i| viridis_at(i as f64 / (n - 1) as f64))
            .collect(),
    }
}

/// Assigns values to classes separated by break points.
///
/// A value below the first break falls in the first class. A value at or above break `i` (and
/// below break `i + 1`) falls in class `i + 1`, so there is one more class than there are breaks.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdScale {
    domain: Vec<f64>,
    colours: Vec<Rgb>,
}

impl ThresholdScale {
    /// Create a new viridis [`ThresholdScale`] with the given break points.
    ///
    /// The breaks are used in the order given.
    pub fn new(domain: Vec<f64>) -> Self {
        if !domain.windows(2).all(|w| w[0] <= w[1]) {
            warn!("Classification breaks are not in increasing order: {domain:?}");
        }

        let colours = viridis(domain.len() + 1);
        Self { domain, colours }
    }

    /// The break points
    pub fn domain(&self) -> &[f64] {
        &self.domain
    }

    /// One colour per class, in class order
    pub fn colours(&self) -> &[Rgb] {
        &self.colours
    }

    /// The class a value falls in
    pub fn class(&self, value: f64) -> usize {
        self.domain
            .iter()
            .position(|&limit| value < limit)
            .unwrap_or(self.domain.len())
    }

    /// The colour of a value
    pub fn colour(&self, value: f64) -> Rgb {
        self.colours[self.class(value)]
    }
}

/// How legend break values are written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelFormat {
    /// Three significant digits with thousands separators, e.g. `12,300`
    Thousands,
    /// Up to two significant digits, e.g. `0.25`
    Ratio,
    /// Up to three significant digits with an SI prefix, e.g. `12.3k`
    SiPrefix,
}

impl LabelFormat {
    /// Format a break value for the legend
    pub fn format(self, value: f64) -> String {
        if !value.is_finite() {
            return value.to_string();
        }

        match self {
            Self::Thousands => group_thousands(&round_significant(value, 3)),
            Self::Ratio => trim_zeros(round_significant(value, 2)),
            Self::SiPrefix => {
                let (scaled, prefix) = si_prefix(value);
                format!("{}{prefix}", trim_zeros(round_significant(scaled, 3)))
            }
        }
    }
}

/// Write a value rounded to `digits` significant digits, keeping trailing zeros
fn round_significant(value: f64, digits: i32) -> String {
    if !value.is_normal() {
        return format!("{:.*}", (digits - 1) as usize, 0.0);
    }

    let exponent = value.abs().log10().floor() as i32;
    let decimals = digits - 1 - exponent;
    if decimals >= 0 {
        format!("{value:.*}", decimals as usize)
    } else {
        let unit = 10f64.powi(-decimals);
        format!("{:.0}", (value / unit).round() * unit)
    }
}

fn trim_zeros(number: String) -> String {
    if number.contains('.') {
        number
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string()
    } else {
        number
    }
}

/// Insert a comma between each group of three integer digits
fn group_thousands(number: &str) -> String {
    let (sign, unsigned) = number
        .strip_prefix('-')
        .map_or(("", number), |rest| ("-", rest));
    let (integer, fraction) = unsigned
        .split_once('.')
        .map_or((unsigned, None), |(integer, fraction)| {
            (integer, Some(fraction))
        });

    let mut grouped = sign.to_string();
    for (i, digit) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    if let Some(fraction) = fraction {
        grouped.push('.');
        grouped.push_str(fraction);
    }

    grouped
}

fn si_prefix(value: f64) -> (f64, &'static str) {
    const PREFIXES: [(f64, &str); 3] = [(1e9, "G"), (1e6, "M"), (1e3, "k")];
    PREFIXES
        .iter()
        .find(|(factor, _)| value.abs() >= *factor)
        .map_or((value, ""), |&(factor, prefix)| (value / factor, prefix))
}
