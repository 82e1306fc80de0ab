use once_cell::sync::OnceCell;

static INIT: OnceCell<()> = OnceCell::new();

pub(crate) fn init() {
    INIT.get_or_init(|| {
        #[cfg(target_os = "android")]
        android_logger::init_once(
            android_logger::Config::default()
                .with_max_level(log::LevelFilter::Info)
                .with_tag("rustjni_hello"),
        );

        #[cfg(not(target_os = "android"))]
        {
            let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
                .try_init();
        }
    });
}
