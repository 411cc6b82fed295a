use regex::Regex;
use std::path::{Path, PathBuf};

use crate::{Message, Res};

/// Attempts to find the corresponding domain file for the given PDDL problem.
/// This method will look for a file named `domain.pddl` in the current and
/// parent folders, as well as for `XXXX.dom.pddl` / `XXXX-domain.pddl`
/// variants of the problem file name.
pub fn find_domain_of(problem_file: &Path) -> Res<PathBuf> {
    // these are the domain file names that we will look for in the current and parent directory
    let mut candidate_domain_files = Vec::with_capacity(3);

    candidate_domain_files.push(match problem_file.extension() {
        Some(ext) => Path::new("domain").with_extension(ext),
        None => Path::new("domain.pddl").to_path_buf(),
    });

    let problem_filename = problem_file
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| Message::error("Invalid problem file name"))?;

    // if the problem file is of the form XXXXX.YY.pb.pddl or XXXXX.pb.pddl,
    // then add XXXXX.dom.pddl to the candidate filenames
    let re = Regex::new("([^\\.]+)(\\.[^\\.]+)?\\.pb\\.(pddl)").unwrap();
    for m in re.captures_iter(problem_filename) {
        let name = format!("{}.dom.{}", &m[1], &m[3]);
        candidate_domain_files.push(name.into());
    }
    // if the problem file is of the form XXXXX.pddl
    // then add XXXXX-domain.pddl to the candidate filenames
    let re = Regex::new("([^\\.]+)\\.(pddl)").unwrap();
    for m in re.captures_iter(problem_filename) {
        let name = format!("{}-domain.{}", &m[1], &m[2]);
        candidate_domain_files.push(name.into());
    }

    // directories where to look for the domain
    let mut candidate_directories = Vec::with_capacity(2);
    if let Some(curr) = problem_file.parent() {
        candidate_directories.push(curr);
        if let Some(parent) = curr.parent() {
            candidate_directories.push(parent);
        }
    }

    for f in &candidate_domain_files {
        for &dir in &candidate_directories {
            let candidate = dir.join(f);
            if candidate.exists() {
                return Ok(candidate);
            }
        }
    }
    Err(Message::error(format!(
        "Could not find a corresponding domain file in the same or parent directory as the problem file. Candidates: {candidate_domain_files:?}"
    )))
}
