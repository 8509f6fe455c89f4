use std::io::Write;

use bson::Bson;
use clap::Parser;

use renoir_mongo::config::CommandLineOptions;
use renoir_mongo::{MongoContext, MongoUri};

type Error = Box<dyn std::error::Error + Send + Sync>;

fn main() -> Result<(), Error> {
    env_logger::init();

    let opts = CommandLineOptions::parse();
    let uri: MongoUri = opts.uri.parse()?;
    let config = opts.context_config()?;
    let ctx = MongoContext::with_config(config, uri)?;

    let result = run(&ctx, &opts);
    ctx.stop();
    result
}

fn run(ctx: &MongoContext, opts: &CommandLineOptions) -> Result<(), Error> {
    let start = std::time::Instant::now();
    let handle = ctx.parallelize(opts.lower, opts.upper, &opts.key)?;

    let mut out = std::io::stdout().lock();
    if opts.count {
        writeln!(out, "{}", handle.count()?)?;
    } else {
        for document in handle.collect()? {
            let json = Bson::Document(document).into_relaxed_extjson();
            writeln!(out, "{}", serde_json::to_string(&json)?)?;
        }
    }
    out.flush()?;

    log::info!("elapsed: {:?}", start.elapsed());
    Ok(())
}
