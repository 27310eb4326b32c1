use clap::Parser;
use moa_viz::options::{MoaCommand, MoaOptions};
use moa_viz::pipeline;


pub fn setup_logger(options: &MoaOptions) -> Result<(), fern::InitError> {
    let dispatch  = fern::Dispatch::new()

        .format(|out, message, record| {
            out.finish(format_args!(
                "{}[{}][{}] {}",
                chrono::Local::now().format("[%H:%M:%S]"),
                record.target(),
                record.level(),
                message
            ))
        })
        .level(log::LevelFilter::Warn)
        .level_for("moa", options.log_level)
        .level_for("moa_viz", options.log_level)
        .level_for("moa_core", options.log_level_rl)
        .level_for("moa_rl", options.log_level_rl);

    match &options.log_file{
        None => dispatch.chain(std::io::stdout()),
        Some(f) => dispatch.chain(fern::log_file(f)?)
    }
        .apply()?;
    Ok(())
}

fn main() -> anyhow::Result<()> {

    let options = MoaOptions::parse();
    setup_logger(&options)?;
    log::debug!("Options: {:?}", options);
    let device = options.device.device();

    match &options.command{
        MoaCommand::Train(train) => {
            let summary = pipeline::run_train(train, device)?;
            println!("Trained for {} updates, {} episodes, last mean return: {:?}",
                summary.updates.len(), summary.episodes, summary.last_mean_return());
        },
        MoaCommand::Collect(collect) => {
            let (_, summary, _) = pipeline::run_collect(collect, device)?;
            println!("summary:\n{:?}", summary);
        },
        MoaCommand::Embed(embed) => {
            let table = pipeline::run_embed(embed)?;
            println!("Embedded {} points", table.len());
        },
        MoaCommand::Plot(plot) => pipeline::run_plot(plot)?,
        MoaCommand::Run(run) => pipeline::run_all(run, device)?,
    }

    Ok(())
}
