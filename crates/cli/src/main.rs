use acervo_core::constants::{DEFAULT_CONVOCATORIAS_DIR, DEFAULT_DATA_DIR, DEFAULT_UPLOADS_DIR};
use acervo_core::{AnimalService, ConsistencyReport, CoreConfig, FileService, ListQuery};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "acervo")]
#[command(about = "Offline administration of Acervo data")]
struct Cli {
    /// Directory holding the indexes and animal documents
    #[arg(long, env = "ACERVO_DATA_DIR", default_value = DEFAULT_DATA_DIR)]
    data_dir: PathBuf,

    /// Directory holding uploaded binaries
    #[arg(long, env = "ACERVO_UPLOADS_DIR", default_value = DEFAULT_UPLOADS_DIR)]
    uploads_dir: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List uploaded files
    Files {
        /// Only files whose search text contains this
        #[arg(long)]
        q: Option<String>,
        #[arg(long, default_value_t = 50)]
        limit: i64,
    },
    /// List animals
    Animals {
        /// Only animals whose search text contains this
        #[arg(long)]
        q: Option<String>,
        #[arg(long, default_value_t = 50)]
        limit: i64,
    },
    /// Compare indexes with the stored documents and binaries
    Verify,
    /// Rebuild the animal index from the stored documents
    RebuildIndex,
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let convocatorias_dir = std::env::var("ACERVO_CONVOCATORIAS_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONVOCATORIAS_DIR));
    let cfg = CoreConfig::new(cli.data_dir, cli.uploads_dir, convocatorias_dir, None)?;

    match cli.command {
        Some(Commands::Files { q, limit }) => {
            let page = FileService::new(&cfg)?.list(
                &ListQuery::new()
                    .search(q)
                    .sort(None, acervo_core::uploads::DEFAULT_SORT)
                    .limit(limit),
            )?;
            if page.items.is_empty() {
                println!("No files found.");
            }
            for file in &page.items {
                println!(
                    "{}  {:>10} B  {}  [{}]",
                    file.id,
                    file.size,
                    file.mimetype,
                    file.tags.join(", ")
                );
            }
            println!("{} of {} shown", page.items.len(), page.total);
        }
        Some(Commands::Animals { q, limit }) => {
            let page = AnimalService::new(&cfg)?.list(
                &ListQuery::new()
                    .search(q)
                    .sort(None, acervo_core::animals::DEFAULT_SORT)
                    .limit(limit),
            )?;
            if page.items.is_empty() {
                println!("No animals found.");
            }
            for animal in &page.items {
                println!(
                    "{}  {} ({}), {}",
                    animal.id, animal.nombre, animal.nombre_cientifico, animal.habitat
                );
            }
            println!("{} of {} shown", page.items.len(), page.total);
        }
        Some(Commands::Verify) => {
            let files = FileService::new(&cfg)?.verify()?;
            let animals = AnimalService::new(&cfg)?.verify()?;
            print_report("files", &files);
            print_report("animals", &animals);
            if !(files.is_consistent() && animals.is_consistent()) {
                anyhow::bail!("indexes are out of step with stored data");
            }
        }
        Some(Commands::RebuildIndex) => {
            let count = AnimalService::new(&cfg)?.rebuild_index()?;
            println!("Rebuilt animal index with {count} entries");
        }
        None => {
            println!("Use 'acervo --help' for commands");
        }
    }

    Ok(())
}

fn print_report(label: &str, report: &ConsistencyReport) {
    println!(
        "{label}: {} indexed, {} stored",
        report.indexed, report.stored
    );
    for id in &report.dangling_entries {
        println!("  indexed but missing: {id}");
    }
    for id in &report.unindexed {
        println!("  stored but not indexed: {id}");
    }
}
