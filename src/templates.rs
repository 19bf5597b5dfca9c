use tera::Tera;

pub const PREVIEW: &str = "preview.html";
pub const VERIFY: &str = "verify.html";

/// Templates are compiled into the binary so the service does not depend on
/// its working directory.
pub fn load() -> Result<Tera, tera::Error> {
    let mut tera = Tera::default();
    tera.add_raw_templates(vec![
        (PREVIEW, include_str!("../templates/preview.html")),
        (VERIFY, include_str!("../templates/verify.html")),
    ])?;
    Ok(tera)
}
