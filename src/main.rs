use clap::Parser;
use miette::{IntoDiagnostic, Result};
use payflow::application::pipeline::PaymentPipeline;
use payflow::application::processor::RandomDecider;
use payflow::config::Config;
use payflow::domain::ports::PaymentStoreRef;
use payflow::error::PaymentError;
use payflow::infrastructure::in_memory::InMemoryPaymentStore;
use payflow::interfaces::csv::payment_writer::PaymentWriter;
use payflow::interfaces::csv::request_reader::RequestReader;
use payflow::logging::init_tracing;
use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

#[cfg(feature = "storage-rocksdb")]
fn open_store(db_path: &Path) -> Result<PaymentStoreRef> {
    use payflow::infrastructure::rocksdb::RocksDBStore;
    let store = RocksDBStore::open(db_path).into_diagnostic()?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_store(db_path: &Path) -> Result<PaymentStoreRef> {
    miette::bail!(
        "cannot open {}: built without the `storage-rocksdb` feature",
        db_path.display()
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();
    init_tracing("info");

    let store: PaymentStoreRef = match &config.db_path {
        Some(db_path) => open_store(db_path)?,
        None => Arc::new(InMemoryPaymentStore::new()),
    };
    let decider =
        Arc::new(RandomDecider::new(config.success_rate).with_max_latency(config.max_latency()));
    let pipeline =
        PaymentPipeline::start(store, decider, usize::from(config.workers)).into_diagnostic()?;

    // Create every payment; the workers start on them straight away
    let file = File::open(&config.input).into_diagnostic()?;
    let reader = RequestReader::new(file);
    let mut created = Vec::new();
    for request in reader.requests() {
        match request {
            Ok(request) => match pipeline.service().create_payment(request).await {
                Ok(payment) => created.push(payment.id),
                Err(PaymentError::CreatedButNotQueued { payment, source }) => {
                    warn!(payment_id = %payment.id, error = %source, "Payment left pending");
                    created.push(payment.id);
                }
                Err(e) => warn!(error = %e, "Error creating payment"),
            },
            Err(e) => warn!(error = %e, "Error reading request"),
        }
    }

    pipeline.drain().await.into_diagnostic()?;

    let mut payments = Vec::with_capacity(created.len());
    for id in created {
        payments.push(pipeline.service().get_payment(id).await?);
    }

    let stats = pipeline.shutdown().await;
    let processed: usize = stats.iter().map(|s| s.processed).sum();
    info!(created = payments.len(), processed, "run complete");

    let stdout = io::stdout();
    let mut writer = PaymentWriter::new(stdout.lock());
    writer.write_payments(payments)?;

    Ok(())
}
