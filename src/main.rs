use anyhow::{Result, anyhow};
use clap::Parser;

use marketscope_rs::analyzer::{self, AnalysisReport};
use marketscope_rs::cli::Args;
use marketscope_rs::types::Scalar;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    if let Err(e) = run(args).await {
        eprintln!("❌ {}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let load_last = args.load_last;
    let question = args.question.clone();
    let config = args.into_config()?;

    let report = if load_last {
        analyzer::load_last(&config)?
    } else {
        let question = question.ok_or_else(|| {
            anyhow!("缺少分析问题。用法: marketscope-rs \"<question>\"，或 --load-last 查看上次结果")
        })?;
        analyzer::launch(config, &question).await?
    };

    print_report(&report);
    Ok(())
}

fn print_report(report: &AnalysisReport) {
    println!();
    println!("📋 {}", report.summary);

    for (rank, row) in report.table.iter().enumerate() {
        let name = row
            .get("entity_name")
            .and_then(Scalar::as_text)
            .unwrap_or("?");
        let detail = row
            .iter()
            .filter(|(key, _)| key.as_str() != "entity_name")
            .map(|(key, value)| match value {
                Scalar::Text(text) => format!("{}: {}", key, text),
                Scalar::Number(number) => format!("{}: {}", key, number),
                Scalar::Bool(flag) => format!("{}: {}", key, flag),
            })
            .collect::<Vec<_>>()
            .join(", ");
        println!("  {}. {} ({})", rank + 1, name, detail);
    }

    if !report.recommendations.is_empty() {
        println!();
        for recommendation in &report.recommendations {
            println!("  💡 {}", recommendation);
        }
    }

    if let Some(error) = &report.error {
        println!();
        println!("⚠️ 本次运行未正常完成: {}", error);
    }
}
