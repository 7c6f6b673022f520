use std::env;
use std::fs;
use std::path::Path;

use logotile_core::export::{self, ExportFormat};
use logotile_core::{DesignFile, DesignSession};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: logotile <design.json> <out-dir>");
        std::process::exit(2);
    }
    let input = Path::new(&args[1]);
    let out_dir = Path::new(&args[2]);

    let design = DesignFile::load(input)?;
    log::info!(
        "{}: {} x {} cm, {} panel(s), {:?} density",
        input.display(),
        design.params.physical_width_cm,
        design.params.physical_height_cm,
        design.panel_list().len(),
        design.density
    );

    let mut session = DesignSession::from_design(&design);
    session.load_images_blocking();
    session.render()?;

    fs::create_dir_all(out_dir)?;
    if design.outputs.png {
        session.export_all(ExportFormat::Png, out_dir)?;
    }
    if design.outputs.pdf {
        session.export_all(ExportFormat::Pdf, out_dir)?;
    }
    if design.outputs.preview {
        let [vw, vh] = design.viewport();
        for small in session.preview(vw, vh)? {
            let path = out_dir.join(format!("{}-preview.png", small.panel));
            fs::write(&path, export::encode_png(&small.pixmap)?)?;
            log::info!("wrote {} ({}x{})", path.display(), small.width(), small.height());
        }
    }
    Ok(())
}
