//! Project initialization, start, type listing, and reset commands.

use std::path::Path;

use anyhow::Result;

pub fn cmd_init(project_dir: &Path, project_type: Option<&str>) -> Result<()> {
    use usher::project::TypeRegistry;
    use usher::state::{ProjectDoc, StateStore, USHER_DIR};
    use usher::usher_config::{UsherToml, CONFIG_FILE};

    let usher_dir = project_dir.join(USHER_DIR);
    let config = UsherToml::load_or_default(&usher_dir)?;
    let registry = TypeRegistry::builtin();

    let type_name = project_type.unwrap_or_else(|| config.default_type());
    let Some(ty) = registry.get(type_name) else {
        let known = registry
            .iter()
            .map(|ty| ty.type_name())
            .collect::<Vec<_>>()
            .join(", ");
        anyhow::bail!("Unknown project type '{type_name}'. Valid types: {known}");
    };

    let store = StateStore::in_dir(project_dir);
    if store.exists() {
        let doc = store.load()?;
        println!(
            "Usher project already initialized at {}",
            usher_dir.display()
        );
        println!("Project type: {}", doc.project_type);
        return Ok(());
    }

    std::fs::create_dir_all(&usher_dir)?;
    let config_path = usher_dir.join(CONFIG_FILE);
    if !config_path.exists() {
        config.save(&config_path)?;
    }

    let mut doc = ProjectDoc::new(
        ty.type_name(),
        ty.phases().into_iter().map(|(name, _)| name),
    );
    store.save(&mut doc)?;

    println!("Initialized usher project at {}", usher_dir.display());
    println!("Project type: {}", ty.type_name());
    println!();
    println!("Created directory structure:");
    println!("  .usher/");
    println!("  ├── project.yaml  # Project document and phase data");
    println!("  ├── usher.toml    # Configuration");
    println!("  └── prompt.md     # Guidance for the current state (written on entry)");
    println!();
    println!("Next steps:");
    println!("  1. Run `usher start <name>` to start the workflow");
    println!("  2. Run `usher status` to see where you are");

    Ok(())
}

pub fn cmd_start(project_dir: &Path, name: &[String]) -> Result<()> {
    use usher::phases::Event;
    use usher::state::USHER_DIR;
    use usher::usher_config::UsherToml;

    let (store, mut workflow) = super::open_workflow(project_dir)?;

    if !workflow.can_fire(Event::StartProject) {
        anyhow::bail!(
            "A project is already in flight (state '{}'). Finish it or run 'usher reset' first.",
            workflow.state()
        );
    }

    let config = UsherToml::load_or_default(&project_dir.join(USHER_DIR))?;
    let name = if name.is_empty() {
        config.project.name.clone()
    } else {
        Some(name.join(" "))
    };

    workflow.doc().borrow_mut().begin_project(name.clone());
    workflow.fire(Event::StartProject)?;
    super::persist(&store, &workflow)?;

    match name {
        Some(name) => println!("Started '{}' ({})", name, workflow.type_name()),
        None => println!("Started project ({})", workflow.type_name()),
    }
    println!("State: {}", workflow.state());
    println!();
    println!("Run 'usher status' to see available actions.");

    Ok(())
}

pub fn cmd_types() -> Result<()> {
    use usher::project::TypeRegistry;

    let registry = TypeRegistry::builtin();

    println!();
    for ty in registry.iter() {
        println!("{}", console::style(ty.type_name()).bold());
        for (name, meta) in ty.phases() {
            let mut notes = Vec::new();
            if name.enable_event().is_some() {
                notes.push("optional");
            }
            if meta.supports_tasks {
                notes.push("tasks");
            }
            if meta.supports_artifacts {
                notes.push("artifacts");
            }
            if !meta.custom_fields.is_empty() {
                notes.push("checklist");
            }
            if notes.is_empty() {
                println!("  {name}");
            } else {
                println!("  {name} ({})", notes.join(", "));
            }
        }
        println!();
    }

    Ok(())
}

pub fn cmd_reset(project_dir: &Path, force: bool) -> Result<()> {
    use dialoguer::Confirm;
    use usher::state::{StateStore, USHER_DIR};
    use usher::usher_config::UsherToml;

    if !force {
        let confirm = Confirm::new()
            .with_prompt("This will delete the project document and all phase data. Are you sure?")
            .default(false)
            .interact()
            .unwrap_or(false);

        if !confirm {
            println!("Reset cancelled");
            return Ok(());
        }
    }

    let store = StateStore::in_dir(project_dir);
    let removed = store.delete()?;

    let usher_dir = project_dir.join(USHER_DIR);
    let config = UsherToml::load_or_default(&usher_dir)?;
    let prompt_file = usher_dir.join(config.prompt_file());
    if prompt_file.exists() {
        std::fs::remove_file(&prompt_file).ok();
    }

    if removed {
        println!("Reset complete");
    } else {
        println!("Nothing to reset");
    }

    Ok(())
}
