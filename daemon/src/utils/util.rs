use std::any::Any;

/// Rounds half away from zero to one decimal.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Panel memory figures scaled one unit up, at most two fraction digits.
pub fn format_memory(value: f64) -> String {
    let text = format!("{:.2}", value / 1024.0);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text == "-0" {
        "0".to_string()
    } else {
        text.to_string()
    }
}

pub fn log_panic(panic_value: Box<dyn Any + Send>) -> String {
    if let Some(msg) = panic_value.downcast_ref::<String>() {
        format!("panic: {}", msg)
    } else if let Some(msg) = panic_value.downcast_ref::<&str>() {
        format!("panic: {}", msg)
    } else {
        format!("panic value type_id={:?}", (*panic_value).type_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round1() {
        assert_eq!(round1(12.34), 12.3);
        assert_eq!(round1(12.25), 12.3);
        assert_eq!(round1(-0.06), -0.1);
        assert_eq!(round1(20.0), 20.0);
    }

    #[test]
    fn test_format_memory() {
        assert_eq!(format_memory(2048.0), "2");
        assert_eq!(format_memory(3584.0), "3.5");
        assert_eq!(format_memory(1000.0), "0.98");
        assert_eq!(format_memory(0.0), "0");
    }

    #[test]
    fn test_log_panic() {
        assert_eq!(log_panic(Box::new("boom")), "panic: boom");
        assert_eq!(log_panic(Box::new(String::from("bang"))), "panic: bang");
    }
}
