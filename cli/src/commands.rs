use anyhow::{anyhow, bail, Context, Result};
use coop_core::forms::{CropForm, FarmerForm, PasswordForm, ValidationErrors};
use coop_core::pages::{
    CropsPage, DashboardPage, FarmersPage, LoginPage, MyCropsPage, Notice, NoticeKind, Phase,
    ProfilePage, Route,
};
use coop_core::pages::login::Tab;
use coop_core::{AuthState, Crop, Error, Farmer, Services};

use crate::{
    CropArgs, CropsCommand, FarmerArgs, FarmersCommand, MyCropsCommand, ProfileCommand,
    ProfileEdits,
};

/// Resolve the persisted token before any page runs.
fn restore(services: &Services) -> Result<()> {
    services
        .session
        .restore()
        .context("could not reach the server to restore the session")?;
    Ok(())
}

fn ensure_ready(phase: &Phase) -> Result<()> {
    match phase {
        Phase::Ready => Ok(()),
        Phase::Loading => bail!("session is still being checked"),
        Phase::Redirect(Route::Login) => bail!("not logged in, run `coop login` first"),
        Phase::Redirect(_) => bail!("this command is not available for your role"),
    }
}

fn print_notice(notice: Option<&Notice>) {
    if let Some(notice) = notice {
        match notice.kind {
            NoticeKind::Success => println!("{}", notice.message),
            NoticeKind::Error => eprintln!("error: {}", notice.message),
        }
    }
}

/// Turn a controller failure into a CLI error, spelling out form problems.
fn report(err: Error) -> anyhow::Error {
    match err {
        Error::Validation(errors) => anyhow!("invalid input:\n{}", field_lines(&errors)),
        other => anyhow!(other),
    }
}

fn field_lines(errors: &ValidationErrors) -> String {
    errors
        .errors()
        .iter()
        .map(|e| format!("  {}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("\n")
}

fn farmer_form(args: FarmerArgs) -> FarmerForm {
    FarmerForm {
        first_name: args.first_name,
        last_name: args.last_name,
        email: args.email,
        password: args.password,
        phone: args.phone.unwrap_or_default(),
        address: args.address.unwrap_or_default(),
        date_of_birth: args.date_of_birth.unwrap_or_default(),
        national_id: args.national_id.unwrap_or_default(),
        farm_size: args.farm_size.unwrap_or_default(),
        farm_location: args.farm_location.unwrap_or_default(),
    }
}

fn apply_edits(form: &mut FarmerForm, edits: ProfileEdits) {
    let fields = [
        (&mut form.first_name, edits.first_name),
        (&mut form.last_name, edits.last_name),
        (&mut form.phone, edits.phone),
        (&mut form.address, edits.address),
        (&mut form.date_of_birth, edits.date_of_birth),
        (&mut form.national_id, edits.national_id),
        (&mut form.farm_size, edits.farm_size),
        (&mut form.farm_location, edits.farm_location),
    ];
    for (field, value) in fields {
        if let Some(value) = value {
            *field = value;
        }
    }
}

fn fill_crop(form: &mut CropForm, args: CropArgs) {
    form.name = args.name;
    form.crop_type = Some(args.crop_type);
    form.quantity = args.quantity;
    form.unit = args.unit;
}

fn print_farmers(farmers: &[Farmer]) {
    if farmers.is_empty() {
        println!("No farmers");
        return;
    }
    println!("{:<38} {:<24} {:<28} {:>5}", "ID", "NAME", "EMAIL", "CROPS");
    for f in farmers {
        println!(
            "{:<38} {:<24} {:<28} {:>5}",
            f.id,
            f.full_name(),
            f.email,
            f.crop_total()
        );
    }
}

fn print_crops(crops: &[Crop], owner: impl Fn(&Crop) -> Option<String>) {
    if crops.is_empty() {
        println!("No crops");
        return;
    }
    println!("{:<38} {:<18} {:<12} {:>12} {:<20}", "ID", "NAME", "TYPE", "QUANTITY", "FARMER");
    for c in crops {
        println!(
            "{:<38} {:<18} {:<12} {:>12} {:<20}",
            c.id,
            c.name,
            c.crop_type.label(),
            format!("{} {}", c.quantity, c.unit),
            owner(c).unwrap_or_default()
        );
    }
}

pub fn login(services: &Services, email: &str, password: &str) -> Result<()> {
    let mut page = LoginPage::new(services);
    page.login.email = email.to_string();
    page.login.password = password.to_string();
    match page.submit_login() {
        Ok(session) => {
            println!("Logged in as {} ({})", session.email, session.role);
            Ok(())
        }
        Err(Error::Validation(errors)) => Err(report(Error::Validation(errors))),
        Err(err) => {
            tracing::debug!(error = %err, "login failed");
            bail!("{}", page.error().unwrap_or("login failed"))
        }
    }
}

pub fn register(services: &Services, args: FarmerArgs) -> Result<()> {
    let mut page = LoginPage::new(services);
    page.select(Tab::Register);
    page.register = farmer_form(args);
    match page.submit_register() {
        Ok(session) => {
            println!("Registered and logged in as {}", session.email);
            Ok(())
        }
        Err(Error::Validation(errors)) => Err(report(Error::Validation(errors))),
        Err(err) => {
            tracing::debug!(error = %err, "registration failed");
            bail!("{}", page.error().unwrap_or("registration failed"))
        }
    }
}

pub fn whoami(services: &Services) -> Result<()> {
    restore(services)?;
    match services.session.state() {
        AuthState::Authenticated(session) => {
            println!("{} ({})", session.email, session.role);
            if let Some(name) = &session.display_name {
                println!("Farmer profile: {name}");
            }
            println!("Session expires {}", session.expires_at.format("%Y-%m-%d %H:%M UTC"));
        }
        _ => println!("Not logged in"),
    }
    Ok(())
}

pub fn dashboard(services: &Services) -> Result<()> {
    restore(services)?;
    let mut page = DashboardPage::new(services);
    ensure_ready(page.open())?;
    print_notice(page.notice());
    let Some(view) = page.view() else {
        bail!("dashboard data unavailable");
    };
    println!("{}\n", view.greeting);
    for card in &view.cards {
        println!("{:<18} {:>8}  {}", card.title, card.value, card.description);
    }
    for chart in &view.charts {
        println!("\n{}", chart.title);
        for point in &chart.points {
            println!("  {:<24} {}", point.label, point.value);
        }
    }
    Ok(())
}

pub fn farmers(services: &Services, cmd: FarmersCommand) -> Result<()> {
    restore(services)?;
    let mut page = FarmersPage::new(services);
    ensure_ready(page.open())?;

    match cmd {
        FarmersCommand::List => {
            print_notice(page.notice());
            print_farmers(page.farmers());
        }
        FarmersCommand::Add(args) => {
            page.start_create();
            if let Some(editor) = page.editor_mut() {
                editor.form = farmer_form(args);
            }
            page.submit().map_err(report)?;
            print_notice(page.notice());
        }
        FarmersCommand::Edit { id, edits } => {
            if !page.start_edit(&id) {
                bail!("no farmer with id {id}");
            }
            if let Some(editor) = page.editor_mut() {
                apply_edits(&mut editor.form, edits);
            }
            page.submit().map_err(report)?;
            print_notice(page.notice());
        }
        FarmersCommand::Delete { id, yes } => {
            if !page.request_delete(&id) {
                bail!("no farmer with id {id}");
            }
            if !yes {
                let label = page.pending_delete().map(|p| p.label.clone()).unwrap_or_default();
                page.cancel_delete();
                bail!("this deletes {label} and all of their crops; re-run with --yes to confirm");
            }
            page.confirm_delete().map_err(report)?;
            print_notice(page.notice());
        }
    }
    Ok(())
}

pub fn crops(services: &Services, cmd: CropsCommand) -> Result<()> {
    restore(services)?;
    let mut page = CropsPage::new(services);
    ensure_ready(page.open())?;

    match cmd {
        CropsCommand::List => {
            print_notice(page.notice());
            print_crops(page.crops(), |c| page.owner_name(c));
        }
        CropsCommand::Add { crop, farmer } => {
            page.start_create();
            if let Some(editor) = page.editor_mut() {
                fill_crop(&mut editor.form, crop);
                editor.form.farmer_id = farmer;
            }
            page.submit().map_err(report)?;
            print_notice(page.notice());
        }
        CropsCommand::SetQuantity { id, quantity } => {
            if !page.start_edit(&id) {
                bail!("no crop with id {id}");
            }
            if let Some(editor) = page.editor_mut() {
                editor.form.quantity = quantity;
            }
            page.submit().map_err(report)?;
            print_notice(page.notice());
        }
        CropsCommand::Delete { id, yes } => {
            if !page.request_delete(&id) {
                bail!("no crop with id {id}");
            }
            if !yes {
                page.cancel_delete();
                bail!("re-run with --yes to delete crop {id}");
            }
            page.confirm_delete().map_err(report)?;
            print_notice(page.notice());
        }
    }
    Ok(())
}

pub fn my_crops(services: &Services, cmd: MyCropsCommand) -> Result<()> {
    restore(services)?;
    let mut page = MyCropsPage::new(services);
    ensure_ready(page.open())?;

    match cmd {
        MyCropsCommand::List => {
            print_notice(page.notice());
            print_crops(page.crops(), |_| None);
        }
        MyCropsCommand::Add(args) => {
            page.start_create().map_err(report)?;
            if let Some(editor) = page.editor_mut() {
                fill_crop(&mut editor.form, args);
            }
            page.submit().map_err(report)?;
            print_notice(page.notice());
        }
        MyCropsCommand::Delete { id, yes } => {
            if !page.request_delete(&id) {
                bail!("no crop with id {id}");
            }
            if !yes {
                page.cancel_delete();
                bail!("re-run with --yes to delete crop {id}");
            }
            page.confirm_delete().map_err(report)?;
            print_notice(page.notice());
        }
    }
    Ok(())
}

pub fn profile(services: &Services, cmd: ProfileCommand) -> Result<()> {
    restore(services)?;
    let mut page = ProfilePage::new(services);
    ensure_ready(page.open())?;

    match cmd {
        ProfileCommand::Show => {
            print_notice(page.notice());
            let Some(detail) = page.detail() else {
                bail!("profile unavailable");
            };
            let f = &detail.farmer;
            println!("{} <{}>", f.full_name(), f.email);
            let rows = [
                ("Phone", f.phone.clone()),
                ("Address", f.address.clone()),
                ("Date of birth", f.birth_date().map(str::to_string)),
                ("National ID", f.national_id.clone()),
                ("Farm size", f.farm_size.map(|s| format!("{s} ha"))),
                ("Farm location", f.farm_location.clone()),
            ];
            for (label, value) in rows {
                println!("{:<14} {}", label, value.unwrap_or_else(|| "-".to_string()));
            }
            println!();
            print_crops(&detail.crops, |_| None);
        }
        ProfileCommand::Edit(edits) => {
            if !page.start_edit() {
                bail!("profile unavailable");
            }
            if let Some(form) = page.profile_form_mut() {
                apply_edits(form, edits);
            }
            page.submit_profile().map_err(report)?;
            print_notice(page.notice());
        }
        ProfileCommand::Password { current, new } => {
            page.password = PasswordForm {
                current_password: current,
                confirm_password: new.clone(),
                new_password: new,
            };
            page.change_password().map_err(report)?;
            print_notice(page.notice());
        }
    }
    Ok(())
}
