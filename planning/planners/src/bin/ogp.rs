use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result, bail, ensure};
use clap::Parser;

use ogp_planners::{SearchParameters, plan_for_every_goals, plan_to_pddl, plan_to_pddl_file_content};
use ogp_planning::pddl::{find_domain_of, input::Input, pddl_to_domain, pddl_to_problem};
use ogp_planning::SetOfCallbacks;

/// An ordered-goals PDDL planner: discharges the goals of the problem in
/// priority order and prints the resulting plan.
#[derive(Debug, Parser)]
#[command(name = "ogp", rename_all = "kebab-case")]
struct Args {
    /// Path to the domain file. If not set, the domain is looked up next to
    /// the problem file.
    #[arg(long, short)]
    domain: Option<PathBuf>,
    /// Path to the problem file.
    #[arg(long, short)]
    problem: Option<PathBuf>,
    /// Directory containing `domain.pddl` and `problem.pddl`.
    #[arg(long)]
    dp: Option<PathBuf>,
    /// Print parsing feedback, the succession cache and the plan details.
    #[arg(long)]
    verbose: bool,
    /// If a plan is found, it will be written to the indicated file.
    #[arg(short, long = "output")]
    output: Option<PathBuf>,
    /// Domain and problem files, for the positional form `ogp DOMAIN PROBLEM`.
    #[arg(value_name = "FILE")]
    files: Vec<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with_writer(std::io::stderr)
        .init();

    let (domain_file, problem_file) = if let Some(directory) = &args.dp {
        (directory.join("domain.pddl"), directory.join("problem.pddl"))
    } else {
        // the positional form puts the domain first and the problem second
        let mut positional = args.files.iter().cloned();
        let domain = args.domain.clone().or_else(|| positional.next());
        let problem = args.problem.clone().or_else(|| positional.next());
        match (domain, problem) {
            (Some(domain), Some(problem)) => (domain, problem),
            (Some(problem), None) if args.domain.is_none() => {
                // a single positional file is the problem; look the domain up next to it
                let domain = find_domain_of(&problem)
                    .map_err(|e| anyhow::anyhow!("{e}"))
                    .context("Consider specifying the domain with the option -d/--domain")?;
                (domain, problem)
            }
            (Some(_), None) => bail!("Missing problem file in arguments."),
            (None, Some(problem)) => {
                let domain = find_domain_of(&problem)
                    .map_err(|e| anyhow::anyhow!("{e}"))
                    .context("Consider specifying the domain with the option -d/--domain")?;
                (domain, problem)
            }
            (None, None) => bail!("Missing domain and problem files in arguments."),
        }
    };

    ensure!(domain_file.exists(), "Domain file {} does not exist", domain_file.display());
    ensure!(
        problem_file.exists(),
        "Problem file {} does not exist",
        problem_file.display()
    );

    let domain = match pddl_to_domain(Input::from_file(&domain_file)?) {
        Ok(domain) => domain,
        Err(message) => {
            eprintln!("{message}");
            std::process::exit(1);
        }
    };
    if args.verbose {
        println!("Parsing domain file \"{}\" done successfully.", domain_file.display());
    }

    let mut problem = match pddl_to_problem(Input::from_file(&problem_file)?, &domain) {
        Ok(problem) => problem,
        Err(message) => {
            eprintln!("{message}");
            std::process::exit(1);
        }
    };
    if args.verbose {
        println!("Parsing problem file \"{}\" done successfully.", problem_file.display());

        println!("\nSuccessions");
        println!("===========\n");
        println!("{}", domain.print_succession_cache());
        println!();
        println!("Searching for a plan...");
    }

    let callbacks = SetOfCallbacks::default();
    let parameters = SearchParameters::default();
    let plan = plan_for_every_goals(&mut problem, &domain, &callbacks, &parameters, None);
    if plan.is_empty() {
        eprintln!("No plan found.");
        std::process::exit(1);
    }
    let plan_str = plan_to_pddl(&plan, &domain);

    if args.verbose {
        println!("Solution found.\n");
        println!("Plan");
        println!("====");
        println!("{plan_str}");
    }

    if let Some(output) = &args.output {
        let mut file = File::create(output).with_context(|| format!("Could not open the file {}", output.display()))?;
        let problem_file_name = problem_file
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("problem.pddl");
        file.write_all(plan_to_pddl_file_content(&plan, &domain, problem_file_name).as_bytes())
            .context("Error while writing plan.")?;
        if args.verbose {
            println!("Output plan wrote in {}", output.display());
        }
    } else if !args.verbose {
        println!("{plan_str}");
    }

    Ok(())
}
