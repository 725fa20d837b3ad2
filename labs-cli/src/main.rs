use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use labs_core::LabsConfig;
use labs_extract::SidecarExtractor;
use labs_query::{CategoryFilter, SeriesQuery};
use labs_store::{AppendStore, DatasetCache};

mod ingest;
mod logging;
mod report;

#[derive(Parser, Debug)]
#[command(
    name = "labs",
    about = "Chuẩn hóa kết quả xét nghiệm từ file PDF thành bộ dữ liệu CSV."
)]
struct Cli {
    /// File cấu hình TOML.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Trích xuất và ghi nối các file PDF trong một thư mục.
    Ingest {
        #[arg(short, long, default_value = "./exames")]
        input: PathBuf,
        #[arg(short, long, default_value = "dados_exames_estruturados.csv")]
        dataset: PathBuf,
        /// Bỏ qua file đã có trong bộ dữ liệu.
        #[arg(long)]
        skip_ingested: bool,
        /// Đuôi file chứa phản hồi trích xuất, đặt cạnh mỗi PDF.
        #[arg(long, default_value = "json")]
        response_ext: String,
    },
    /// Xem diễn biến của một hay nhiều xét nghiệm.
    Show {
        #[arg(short, long, default_value = "dados_exames_estruturados.csv")]
        dataset: PathBuf,
        #[arg(short = 'e', long = "exam")]
        exams: Vec<String>,
        #[arg(long)]
        category: Option<String>,
        /// In kết quả dạng JSON.
        #[arg(long)]
        json: bool,
    },
    /// Liệt kê nhóm, xét nghiệm và file nguồn.
    List {
        #[arg(short, long, default_value = "dados_exames_estruturados.csv")]
        dataset: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    logging::init();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Ingest {
            input,
            dataset,
            skip_ingested,
            response_ext,
        } => {
            let documents = ingest::list_documents(&input)?;
            if documents.is_empty() {
                println!("No PDF files in {}", input.display());
                return Ok(());
            }

            let store = AppendStore::new(dataset, config.value_policy);
            let summary = ingest::run(
                &documents,
                &store,
                &SidecarExtractor::with_extension(response_ext),
                &config,
                ingest::IngestOptions { skip_ingested },
            )?;

            println!(
                "Documents: {}\nStored: {}\nSkipped: {}\nFailed: {}\nRows written: {}",
                documents.len(),
                summary.stored(),
                summary.skipped(),
                summary.failed(),
                summary.rows_written()
            );
        }
        Command::Show {
            dataset,
            exams,
            category,
            json,
        } => {
            let query = SeriesQuery {
                category: category.map(CategoryFilter::Only).unwrap_or_default(),
                exams,
            };
            let mut cache = DatasetCache::new(dataset);
            print!("{}", report::show(&mut cache, &query, &config, json)?);
        }
        Command::List { dataset } => {
            let mut cache = DatasetCache::new(dataset);
            print!("{}", report::list(&mut cache, &config)?);
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<LabsConfig> {
    match path {
        Some(path) => LabsConfig::load(path)
            .with_context(|| format!("Không đọc được cấu hình {:?}", path)),
        None => Ok(LabsConfig::default()),
    }
}
