//! `validate`: run one argument validator and print the normalized value.

use sdnsh_core::validate::{
    validate_cidr_range, validate_date, validate_dpid, validate_duration, validate_inverse_netmask,
    validate_ip_address_not_mask, validate_mac_address, validate_netmask,
};
use sdnsh_core::{Session, Typedef};

use crate::cli::{GlobalOpts, ValidateArgs, ValueKind};
use crate::error::CliError;
use crate::output;

pub async fn handle(session: &Session, args: ValidateArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let value = args.value.as_str();
    let normalized = match args.kind {
        ValueKind::Identifier => session.validate_identifier(&Typedef::named("identifier"), value)?,
        ValueKind::Cidr => validate_cidr_range(value)?,
        ValueKind::Netmask => validate_netmask(value)?,
        ValueKind::InverseNetmask => validate_inverse_netmask(value)?,
        ValueKind::Ip => validate_ip_address_not_mask(value)?,
        ValueKind::Mac => validate_mac_address(value)?,
        ValueKind::Dpid => validate_dpid(value)?,
        ValueKind::Date => validate_date(value)?,
        ValueKind::Duration => validate_duration(value)?,
        ValueKind::Switch => connected(session)?.validate_switch_dpid(value).await?,
        ValueKind::Host => connected(session)?.validate_host(value).await?,
        ValueKind::Address => session.validate_resolvable_ip_address(value).await?,
        ValueKind::Config => connected(session)?.validate_config(value).await?,
    };

    let rendered = output::render(global.output, &normalized, Clone::clone)?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}

/// Validators that read controller tables need a controller.
fn connected(session: &Session) -> Result<&Session, CliError> {
    if session.config().controller.is_none() {
        return Err(CliError::NoController);
    }
    Ok(session)
}
