fn main() -> anyhow::Result<()> {
    poromet::run()
}
