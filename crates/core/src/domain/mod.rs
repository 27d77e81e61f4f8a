pub mod company;
pub mod transcript;

// The upstream writes "None", "-" or "" for missing numbers.
pub fn parse_num(s: &str) -> Option<f64> {
    let t = s.trim();
    if t.is_empty() {
        return None;
    }
    t.parse::<f64>().ok().filter(|v| v.is_finite())
}

pub fn parse_opt_num(s: Option<&str>) -> Option<f64> {
    s.and_then(parse_num)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_num_rejects_upstream_placeholders() {
        assert_eq!(parse_num("1.25"), Some(1.25));
        assert_eq!(parse_num(" -0.5 "), Some(-0.5));
        assert_eq!(parse_num("None"), None);
        assert_eq!(parse_num("-"), None);
        assert_eq!(parse_num(""), None);
        assert_eq!(parse_num("NaN"), None);
        assert_eq!(parse_opt_num(None), None);
    }
}
