use std::io::Write;

pub fn run(args: &[String], stderr: &mut dyn Write) -> i32 {
    let target = match args.first() {
        Some(dir) if dir == "-" => match std::env::var("OLDPWD") {
            Ok(prev) => prev,
            Err(_) => {
                let _ = writeln!(stderr, "mash: cd: OLDPWD not set");
                return 1;
            }
        },
        Some(dir) => dir.clone(),
        None => std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    };

    if let Ok(cwd) = std::env::current_dir() {
        unsafe { std::env::set_var("OLDPWD", cwd) };
    }

    if let Err(e) = std::env::set_current_dir(&target) {
        let _ = writeln!(stderr, "mash: cd: {target}: {e}");
        return 1;
    }
    if let Ok(cwd) = std::env::current_dir() {
        unsafe { std::env::set_var("PWD", cwd) };
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cd_to_missing_dir_fails() {
        let mut stderr = Vec::new();
        let status = run(&["/no/such/path/mash-test".to_string()], &mut stderr);
        assert_eq!(status, 1);
        assert!(!stderr.is_empty());
    }
}
