use std::io::Write;
use std::time::Duration;

/// `sleep SECONDS` — SECONDS may be fractional (e.g. `0.5`).
pub fn run(args: &[String], stderr: &mut dyn Write) -> i32 {
    let Some(raw) = args.first() else {
        let _ = writeln!(stderr, "mash: sleep: usage: sleep SECONDS");
        return 1;
    };
    match raw.parse::<f64>() {
        Ok(secs) if secs >= 0.0 => {
            std::thread::sleep(Duration::from_secs_f64(secs));
            0
        }
        _ => {
            let _ = writeln!(stderr, "mash: sleep: {raw}: invalid duration");
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_numeric_duration() {
        let mut stderr = Vec::new();
        assert_eq!(run(&["soon".to_string()], &mut stderr), 1);
    }

    #[test]
    fn zero_duration_succeeds_immediately() {
        let mut stderr = Vec::new();
        assert_eq!(run(&["0".to_string()], &mut stderr), 0);
    }
}
