use std::io::Write;
use std::path::Path;

use crate::shell::Shell;

pub fn run_source(args: &[String], shell: &mut Shell, stderr: &mut dyn Write) -> i32 {
    let Some(path) = args.first() else {
        let _ = writeln!(stderr, "mash: source: usage: source FILE");
        return 1;
    };
    match shell.source_file(Path::new(path)) {
        Ok(()) => 0,
        Err(e) => {
            let _ = writeln!(stderr, "{e}");
            1
        }
    }
}
