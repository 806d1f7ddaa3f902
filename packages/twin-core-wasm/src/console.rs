use wasm_bindgen::prelude::*;

// Binding to the browser console for the console_log! macro in lib.rs.
#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = console)]
    pub fn log(s: &str);
}
