fn main() -> anyhow::Result<()> {
    mediatracker_lib::run()
}
