//! Binary entry point for the photonorm CLI

fn main() -> anyhow::Result<()> {
    photonorm::cli::main()
}
