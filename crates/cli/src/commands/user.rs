//! Member and ledger commands

use anyhow::{Context, Result};
use britewallet_business::ServiceContext;
use britewallet_core::{Movement, SemesterId, User};

use super::print_json;
use crate::{parse_roles, MovementAction, UserAction};

/// Handle user subcommands
pub async fn handle(ctx: &ServiceContext, action: UserAction, json: bool) -> Result<()> {
    match action {
        UserAction::Create {
            id,
            first_name,
            last_name,
            pack,
            card,
            email,
            roles,
        } => {
            let mut user =
                User::new(&id, &first_name, &last_name, pack.to_core(), ctx.now()).with_roles(parse_roles(roles)?);
            if let Some(card) = card.as_deref() {
                user = user.with_card(card);
            }
            if let Some(email) = email.as_deref() {
                user = user.with_email(email);
            }

            ctx.store()
                .insert_user(&user)
                .await
                .with_context(|| format!("Failed to create user {}", id))?;

            if json {
                return print_json(&user);
            }
            println!("✅ User created!");
            println!("   ID:    {}", user.id);
            println!("   Name:  {}", user.display_with_card());
            println!("   Pack:  {}", user.club_pack.as_str());
        }

        UserAction::Show { id } => {
            let user = ctx
                .store()
                .find_user(&id)
                .await?
                .with_context(|| format!("User not found: {}", id))?;
            let movements = ctx.store().movements_for_user(&id).await?;

            if json {
                return print_json(&serde_json::json!({ "user": user, "movements": movements }));
            }

            println!("👤 {}", user.display_with_card());
            println!("   Pack:   {}", user.club_pack.as_str());
            let roles: Vec<&str> = user.roles.iter().map(|r| r.as_str()).collect();
            println!("   Roles:  {}", roles.join(", "));
            println!();
            println!("   {:<10} {:>10}  {:<24} {}", "Semester", "Amount", "Type", "Notes");
            for movement in movements {
                println!(
                    "   {:<10} {:>10}  {:<24} {}",
                    movement.semester_id.to_string(),
                    movement.amount_change,
                    movement.movement_type.as_str(),
                    movement.notes.as_deref().unwrap_or("")
                );
            }
        }
    }

    Ok(())
}

/// Handle movement subcommands
pub async fn handle_movement(ctx: &ServiceContext, action: MovementAction, json: bool) -> Result<()> {
    match action {
        MovementAction::Add {
            user_id,
            amount,
            r#type,
            semester,
            pack,
            notes,
        } => {
            let now = ctx.now();
            let semester = match semester {
                Some(id) => SemesterId::parse(&id)?,
                None => SemesterId::containing(now),
            };

            let mut movement = Movement::new(&user_id, amount, r#type.to_core(), semester, pack.to_core(), now)?;
            if let Some(notes) = notes.as_deref() {
                movement = movement.with_notes(notes);
            }
            ctx.store().insert_movement(&movement).await?;

            if json {
                return print_json(&movement);
            }
            println!("✅ Movement recorded!");
            println!("   ID:        {}", movement.id);
            println!("   User:      {}", movement.user_id);
            println!("   Amount:    {} ({})", movement.amount_change, movement.movement_type.as_str());
            println!("   Semester:  {}", movement.semester_id);
        }
    }

    Ok(())
}
