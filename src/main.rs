use std::env;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

// Use the library crate's modules
use leon3_iss::config::parse_u32;
use leon3_iss::{unpack_image, Fidelity, SimConfig, SimError, System};

const USAGE: &str = "<image> [--load <addr>] [--entry <addr>] [--cycles <n>] [--ram <mb>] \
[--windows <n>] [--fidelity functional|cycle-accurate] [--tsim] [--config <file>]";

fn to_io(e: SimError) -> io::Error {
    io::Error::new(io::ErrorKind::Other, e.to_string())
}

fn bad_arg(flag: &str, value: Option<&String>) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("invalid value for {}: {}", flag, value.map(String::as_str).unwrap_or("<missing>")),
    )
}

fn number(flag: &str, value: Option<&String>) -> io::Result<u32> {
    value.and_then(|v| parse_u32(v)).ok_or_else(|| bad_arg(flag, value))
}

fn main() -> io::Result<()> {
    let args: Vec<String> = env::args().collect();
    let mut image_path = String::new();
    let mut config_path: Option<String> = None;
    let mut load_addr: Option<u32> = None;
    let mut entry: Option<u32> = None;
    let mut max_cycles: u64 = 100_000_000;
    let mut ram_size_mb: Option<u32> = None;
    let mut windows: Option<u32> = None;
    let mut fidelity: Option<Fidelity> = None;
    let mut tsim = false;

    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "--load" => {
                i += 1;
                load_addr = Some(number(flag, args.get(i))?);
            }
            "--entry" => {
                i += 1;
                entry = Some(number(flag, args.get(i))?);
            }
            "--cycles" => {
                i += 1;
                max_cycles = args
                    .get(i)
                    .and_then(|v| v.parse().ok())
                    .ok_or_else(|| bad_arg(flag, args.get(i)))?;
            }
            "--ram" => {
                i += 1;
                ram_size_mb = Some(number(flag, args.get(i))?);
            }
            "--windows" => {
                i += 1;
                windows = Some(number(flag, args.get(i))?);
            }
            "--fidelity" => {
                i += 1;
                let value = args.get(i).ok_or_else(|| bad_arg(flag, None))?;
                fidelity = Some(value.parse().map_err(to_io)?);
            }
            "--config" => {
                i += 1;
                config_path = Some(args.get(i).ok_or_else(|| bad_arg(flag, None))?.clone());
            }
            "--tsim" => {
                tsim = true;
            }
            arg if !arg.starts_with('-') => {
                image_path = arg.to_string();
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
            }
        }
        i += 1;
    }

    if image_path.is_empty() {
        eprintln!("Usage: {} {}", args[0], USAGE);
        std::process::exit(1);
    }

    let mut config = match &config_path {
        Some(path) => {
            let mut config = SimConfig::from_file(Path::new(path)).map_err(to_io)?;
            config.apply_env_overrides().map_err(to_io)?;
            config
        }
        None => SimConfig::load().map_err(to_io)?,
    };
    if let Some(mb) = ram_size_mb {
        config.ram_size_mb = mb;
    }
    if let Some(n) = windows {
        config.num_reg_win = n;
    }
    if let Some(f) = fidelity {
        config.fidelity = f;
    }
    if tsim {
        config.tsim_compat = true;
    }
    let load_addr = load_addr.unwrap_or(config.ram_base);
    config.entry_point = entry.unwrap_or(load_addr);

    println!("LEON3 ISS");
    println!("Loading image: {} at 0x{:08x}", image_path, load_addr);
    println!(
        "RAM: {} MB at 0x{:08x}, {} windows, {:?}",
        config.ram_size_mb, config.ram_base, config.num_reg_win, config.fidelity
    );

    let mut system = System::new(config).map_err(to_io)?;

    let mut f = File::open(&image_path)?;
    let mut data = Vec::new();
    f.read_to_end(&mut data)?;
    let image = unpack_image(&data).map_err(to_io)?;
    system.load_binary(&image, load_addr).map_err(to_io)?;

    println!("System ready. Starting simulation ({})...", system.strategy_name());
    println!("-------------------------------------");

    while system.cycles() < max_cycles && !system.is_halted() {
        // Run a batch of cycles for performance
        let batch = (max_cycles - system.cycles()).min(10_000) as u32;
        if let Err(e) = system.run(batch) {
            eprintln!("Simulation stopped: {}", e);
            dump_state(&system);
            // 2: the guest faulted, 1: host-side failure
            std::process::exit(if e.is_guest_fatal() { 2 } else { 1 });
        }
    }

    if system.is_halted() {
        println!("\nHalted by trap instruction.");
    } else {
        println!("\nCycle limit reached.");
    }
    dump_state(&system);
    Ok(())
}

fn dump_state(system: &System) {
    let regs = system.get_registers();
    let sregs = &system.cpu.sregs;
    let names = ["g", "o", "l", "i"];
    for (bank, name) in names.iter().enumerate() {
        let line: Vec<String> = (0..8)
            .map(|r| format!("%{}{}=0x{:08x}", name, r, regs[bank * 8 + r]))
            .collect();
        println!("{}", line.join(" "));
    }
    println!(
        "pc=0x{:08x} npc=0x{:08x} psr=0x{:08x} wim=0x{:08x} tbr=0x{:08x} y=0x{:08x}",
        system.cpu.pc, system.cpu.npc, sregs.psr, sregs.wim, sregs.tbr, sregs.y
    );
    let (hits, misses) = system.icache_stats();
    println!(
        "cycles={} instructions={} traps={} icache hits={} misses={}",
        system.cycles(),
        system.get_instruction_count(),
        system.cpu.trap_count,
        hits,
        misses
    );
}
