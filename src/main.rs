fn main() -> anyhow::Result<()> {
    shell_app::run()
}
