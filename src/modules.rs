use cc_base::config::EngineConfig;
use cc_base::modules::Module;

use cc_mod_files::FilesModule;
use cc_mod_git::GitModule;
use cc_mod_instructions::InstructionsModule;
use cc_mod_web::WebModule;

/// Every content domain, in the order their stores are reset.
pub fn all_modules(config: &EngineConfig) -> Vec<Box<dyn Module>> {
    vec![
        Box::new(FilesModule),
        Box::new(GitModule),
        Box::new(WebModule),
        Box::new(InstructionsModule::new(config.instruction_debounce())),
    ]
}
