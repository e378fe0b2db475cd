fn main() -> anyhow::Result<()> {
    libertyfs::cli::run_cli()
}
