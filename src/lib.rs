pub mod ast;
pub mod blocks;
pub mod parser;
pub mod relational;

use wasm_bindgen::prelude::*;

use parser::Parser;
use relational::LogicalModel;

/// Initialize panic hook for better error messages in WASM
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();
}

/// Compile an ER description to its conceptual and logical models, as JSON
#[wasm_bindgen(js_name = "erToModels")]
pub fn er_to_models(source: &str) -> Result<String, String> {
    let conceptual = Parser::new(source).parse().map_err(|e| e.to_string())?;
    let logical = LogicalModel::from_conceptual(&conceptual).map_err(|e| e.to_string())?;

    Ok(serde_json::json!({
        "conceptual": conceptual,
        "logical": logical,
    })
    .to_string())
}
