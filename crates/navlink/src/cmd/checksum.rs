use navlink_frame::{Verifier, VerifierKind};
use serde::Serialize;

use crate::cmd::ChecksumArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_fields, print_raw, OutputFormat};

#[derive(Serialize)]
struct ChecksumOutput {
    verifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    polynomial: Option<String>,
    input_size: usize,
    checksum: String,
    value: u32,
}

pub fn run(args: ChecksumArgs, format: OutputFormat) -> CliResult<i32> {
    let kind = args.verifier.kind(args.polynomial)?;
    let data = args.payload.resolve()?;

    let mut verifier = Verifier::new(kind);
    verifier.init();
    let value = verifier.compute(&data);
    let size = verifier.result_size();

    if matches!(format, OutputFormat::Raw) {
        // wire order
        print_raw(&value.to_le_bytes()[..size]);
        return Ok(SUCCESS);
    }

    let out = ChecksumOutput {
        verifier: format!("{:?}", args.verifier).to_lowercase(),
        polynomial: match kind {
            VerifierKind::Crc { polynomial, .. } => Some(format!("0x{polynomial:X}")),
            _ => None,
        },
        input_size: data.len(),
        checksum: format!("0x{value:0width$X}", width = size * 2),
        value,
    };
    let mut fields = vec![
        ("verifier", out.verifier.clone()),
        ("input_size", out.input_size.to_string()),
        ("checksum", out.checksum.clone()),
    ];
    if let Some(polynomial) = &out.polynomial {
        fields.insert(1, ("polynomial", polynomial.clone()));
    }
    print_fields(&fields, &out, format);
    Ok(SUCCESS)
}
