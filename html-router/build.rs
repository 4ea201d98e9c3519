fn main() {
    let profile = std::env::var("PROFILE").unwrap_or_else(|_| "debug".to_string());

    // Embed templates only for release builds; debug builds load them from
    // disk with autoreload.
    if profile == "release" {
        minijinja_embed::embed_templates!("templates");
    } else {
        println!("cargo:info=Build: Skipping template embedding for debug build.");
    }
}
